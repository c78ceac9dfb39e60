//! Client core for CommitHub, a developer-matching network.
//!
//! [`app::CommitHub`] wires everything together: the REST client
//! ([`api`]), the shared state container ([`store`]), and one realtime
//! connection ([`realtime`]) that presence and chat share.

pub mod api;
pub mod api_objects;
pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
mod connection;
pub mod connections;
pub mod error;
pub mod feed;
pub mod logging;
mod polling;
pub mod premium;
pub mod presence;
pub mod profile;
pub mod protocol_objects;
pub mod realtime;
pub mod session;
pub mod store;
pub mod subscription;
pub mod task;
pub mod types;
pub mod utils;
pub mod validation;

pub use app::CommitHub;
pub use config::ClientConfig;
pub use error::ClientError;
