mod auth;
mod chat;
mod connection;
mod premium;
mod user;

pub use auth::*;
pub use chat::{ChatHistory, ChatMessage, Sender, StoredMessage};
pub use connection::{ConnectionRequest, DataEnvelope, DecisionReceipt, FeedResponse};
pub use premium::*;
pub use user::{ProfileUpdate, User};
