use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{protocol_objects::MessageReceived, utils::relative_time};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    #[serde(default)]
    pub sender_id: Option<Sender>,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// A chat line as the client displays it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub first_name: String,
    pub last_name: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<StoredMessage> for ChatMessage {
    fn from(message: StoredMessage) -> Self {
        let sender = message.sender_id.unwrap_or_default();
        Self {
            first_name: sender.first_name,
            last_name: sender.last_name,
            text: message.text,
            created_at: message.created_at,
        }
    }
}

impl ChatMessage {
    /// Live messages without a server timestamp are stamped on arrival.
    pub fn received(message: MessageReceived, now: DateTime<Utc>) -> Self {
        Self {
            first_name: message.first_name,
            last_name: message.last_name,
            text: message.text,
            created_at: Some(message.created_at.unwrap_or(now)),
        }
    }

    /// "Just now", "5m ago", and so on.
    pub fn sent_ago(&self, now: DateTime<Utc>) -> String {
        relative_time(now, self.created_at)
    }
}
