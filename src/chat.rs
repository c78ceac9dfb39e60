//! One-to-one chat with a connection.
//!
//! Messages travel over the shared realtime connection. Its payloads carry no
//! room id, so every open session sees every `messageReceived` delivered to
//! this client; the server only delivers messages for rooms this client
//! joined.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    api::ApiClient,
    api_objects::{ChatMessage, MembershipStatus, User},
    error::ClientError,
    protocol_objects::{InboundEvent, JoinChat, OutboundEvent, SendMessage},
    realtime::RealtimeHub,
    store::{Store, StoreEvent},
    subscription::RealtimeSubscription,
    types::{Result, Route, Topic},
};

/// Chat is open to members whose premium has not yet expired.
pub fn can_chat(status: &MembershipStatus, now: DateTime<Utc>) -> bool {
    status.is_active(now)
}

pub struct ChatSession {
    me: User,
    target_user_id: String,
    partner: Option<User>,
    messages: Vec<ChatMessage>,
    subscription: RealtimeSubscription,
}

impl ChatSession {
    /// Checks the premium gate, loads history and joins the room.
    ///
    /// Without an active membership the store is sent to the premium route
    /// and [`ClientError::PremiumRequired`] is returned.
    pub async fn open(
        api: &ApiClient,
        store: &Store,
        hub: &RealtimeHub,
        target_user_id: &str,
    ) -> Result<Self> {
        let Some(me) = store.user().await else {
            return Err(ClientError::Unauthorized);
        };

        match store.intercept(api.premium_status().await).await {
            Ok(status) if can_chat(&status, Utc::now()) => {}
            Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
            outcome => {
                if let Err(error) = outcome {
                    warn!("Premium check failed, gating chat: {error}");
                }
                store.navigate(Route::Premium).await;
                store.publish(StoreEvent::PremiumRequired);
                return Err(ClientError::PremiumRequired);
            }
        }

        let partner = match store.intercept(api.user_profile(target_user_id).await).await {
            Ok(partner) => Some(partner),
            Err(error) => {
                warn!("Failed to load chat partner {target_user_id}: {error}");
                None
            }
        };

        let messages = match store.intercept(api.chat_history(target_user_id).await).await {
            Ok(history) => history.messages.into_iter().map(ChatMessage::from).collect(),
            Err(error) => {
                warn!("Failed to load chat history with {target_user_id}: {error}");
                vec![]
            }
        };

        let subscription = hub.subscribe(Topic::Chat).await?;
        subscription
            .emit(OutboundEvent::JoinChat(JoinChat {
                first_name: me.first_name.clone(),
                user_id: me.id.clone(),
                target_user_id: String::from(target_user_id),
            }))
            .await?;

        debug!(
            "Joined chat with {target_user_id}, {} messages in history.",
            messages.len()
        );

        Ok(Self {
            me,
            target_user_id: String::from(target_user_id),
            partner,
            messages,
            subscription,
        })
    }

    /// Sends `text` to the partner. Blank text is not sent and returns `false`.
    pub async fn send(&self, text: &str) -> Result<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }

        self.subscription
            .emit(OutboundEvent::SendMessage(SendMessage {
                first_name: self.me.first_name.clone(),
                last_name: self.me.last_name.clone(),
                user_id: self.me.id.clone(),
                target_user_id: self.target_user_id.clone(),
                text: String::from(text),
            }))
            .await?;
        Ok(true)
    }

    /// Waits for the next chat message and appends it to the history.
    /// `None` once the user session has ended.
    pub async fn next_message(&mut self) -> Option<ChatMessage> {
        loop {
            if let InboundEvent::MessageReceived(message) = self.subscription.recv().await? {
                let message = ChatMessage::received(message, Utc::now());
                self.messages.push(message.clone());
                return Some(message);
            }
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn partner(&self) -> Option<&User> {
        self.partner.as_ref()
    }

    pub fn target_user_id(&self) -> &str {
        &self.target_user_id
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::types::MembershipType;

    #[test]
    fn test_can_chat_needs_unexpired_premium() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let mut status = MembershipStatus {
            is_premium: true,
            membership_type: Some(MembershipType::Silver),
            membership_expiry: Some(now + Duration::days(1)),
            days_until_expiry: None,
        };
        assert!(can_chat(&status, now));

        status.membership_expiry = Some(now - Duration::seconds(1));
        assert!(!can_chat(&status, now));

        status.membership_expiry = None;
        assert!(!can_chat(&status, now));

        assert!(!can_chat(&MembershipStatus::default(), now));
    }
}
