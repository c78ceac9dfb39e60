use thiserror::Error;
use tokio::task::JoinError;

use crate::{protocol_objects::EnginePacket, validation::ValidationError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to connect to WebSocket: {0}")]
    ConnectionError(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to (de)serialize JSON: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Realtime connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Realtime client is not connected")]
    NotConnected,

    #[error("Timed out after {0:?} while {1}")]
    Timeout(std::time::Duration, &'static str),

    #[error("Failed to send packet through channel: {0}")]
    MpscSendError(#[from] Box<tokio::sync::mpsc::error::SendError<EnginePacket>>),

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Socket handshake rejected: {reason}")]
    Handshake { reason: String },

    #[error("Malformed packet {packet:?}: {reason}")]
    Protocol { packet: String, reason: String },

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Server responded with {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Daily decision limit reached: {message}")]
    QuotaExceeded { message: String },

    #[error("An active premium membership is required")]
    PremiumRequired,

    #[error("Candidate {0} is not in the local feed")]
    UnknownCandidate(String),

    #[error("Payment checkout failed: {0}")]
    Checkout(String),

    #[error("Task panicked or was cancelled: {0}")]
    TaskPanic(#[from] JoinError),

    #[error("Multiple tasks failed ({} errors): {}", errors.len(), .errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    MultipleTaskErrors { errors: Vec<ClientError> },
}

impl ClientError {
    pub(crate) fn protocol(packet: &str, reason: impl Into<String>) -> Self {
        ClientError::Protocol {
            packet: String::from(packet),
            reason: reason.into(),
        }
    }

    /// True for the failures that mean "the session cookie is no longer valid".
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::ConnectionError(Box::new(err))
    }
}

impl From<tokio::sync::mpsc::error::SendError<EnginePacket>> for ClientError {
    fn from(err: tokio::sync::mpsc::error::SendError<EnginePacket>) -> Self {
        ClientError::MpscSendError(Box::new(err))
    }
}
