use std::{fmt::Display, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::ClientError, protocol_objects::SocketPacket};

// Constants
pub const DEFAULT_API_URL: &str = "http://localhost:7777";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 5;
pub const DEFAULT_FEED_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PAYMENT_VERIFY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_EVENT_BUFFER: usize = 64;
pub const MAX_RECONNECTION_DELAY: Duration = Duration::from_secs(60);
pub const SOCKET_IO_PATH: &str = "/socket.io/";
pub const DEFAULT_NAMESPACE: &str = "/";

pub type Result<Type> = std::result::Result<Type, ClientError>;

pub(crate) type PacketReceivedCallback = Arc<dyn Fn(SocketPacket) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Websocket,
    Polling,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Websocket => "websocket",
            TransportKind::Polling => "polling",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Some(TransportKind::Websocket),
            "polling" => Some(TransportKind::Polling),
            _ => None,
        }
    }
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stream of server events a realtime subscription listens to. Each has
/// its own buffer, so a slow reader on one never loses events on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Presence,
    Chat,
}

/// Why the client considers itself logged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousReason {
    /// The backend answered 401.
    Unauthorized,
    /// The profile probe failed for any other reason (network, 5xx, decode).
    Unreachable,
    LoggedOut,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Unknown,
    Checking,
    Authenticated,
    Anonymous(AnonymousReason),
}

impl SessionPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::Authenticated)
    }
}

/// Swipe decision on a feed candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Interested,
    Ignored,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Interested => "interested",
            Verdict::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Accepted,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Accepted => "accepted",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    Silver,
    Gold,
}

impl Display for MembershipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipType::Silver => write!(f, "Silver"),
            MembershipType::Gold => write!(f, "Gold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Feed,
    Login,
    Signup,
    Profile,
    Connections,
    Requests,
    Chat(String),
    Premium,
    ChangePassword,
    VerifyEmail,
    ForgotPassword,
    ResetPassword,
}

impl Route {
    /// Routes reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Route::Login
                | Route::Signup
                | Route::VerifyEmail
                | Route::ForgotPassword
                | Route::ResetPassword
        )
    }

    pub fn path(&self) -> String {
        match self {
            Route::Feed => String::from("/"),
            Route::Login => String::from("/login"),
            Route::Signup => String::from("/signup"),
            Route::Profile => String::from("/profile"),
            Route::Connections => String::from("/connections"),
            Route::Requests => String::from("/requests"),
            Route::Chat(target) => format!("/chat/{target}"),
            Route::Premium => String::from("/premium"),
            Route::ChangePassword => String::from("/change-password"),
            Route::VerifyEmail => String::from("/verify-email"),
            Route::ForgotPassword => String::from("/forgot-password"),
            Route::ResetPassword => String::from("/reset-password"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        assert!(Route::Login.is_public());
        assert!(Route::ResetPassword.is_public());
        assert!(!Route::Feed.is_public());
        assert!(!Route::Chat(String::from("u1")).is_public());
        assert_eq!(Route::Chat(String::from("u1")).path(), "/chat/u1");
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!(TransportKind::parse(" WebSocket"), Some(TransportKind::Websocket));
        assert_eq!(TransportKind::parse("polling"), Some(TransportKind::Polling));
        assert_eq!(TransportKind::parse("sse"), None);
    }
}
