use std::fmt::Display;

use serde_json::Value;

use crate::types::{Result, Topic};

use super::{
    chat::{JoinChat, MessageReceived, SendMessage},
    presence::{UserIdPayload, UserStatus},
    socket_packet::SocketPacket,
};

/// Events the client emits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundEvent {
    JoinChat(JoinChat),
    SendMessage(SendMessage),
    JoinUserStatus(UserStatus),
    UserOnline(UserStatus),
    UserOffline(UserStatus),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinChat(_) => "joinChat",
            OutboundEvent::SendMessage(_) => "sendMessage",
            OutboundEvent::JoinUserStatus(_) => "joinUserStatus",
            OutboundEvent::UserOnline(_) => "userOnline",
            OutboundEvent::UserOffline(_) => "userOffline",
        }
    }

    pub fn to_packet(&self, namespace: &str) -> Result<SocketPacket> {
        let payload = match self {
            OutboundEvent::JoinChat(payload) => serde_json::to_value(payload)?,
            OutboundEvent::SendMessage(payload) => serde_json::to_value(payload)?,
            OutboundEvent::JoinUserStatus(payload)
            | OutboundEvent::UserOnline(payload)
            | OutboundEvent::UserOffline(payload) => serde_json::to_value(payload)?,
        };

        Ok(SocketPacket::event(namespace, self.name(), payload))
    }
}

impl Display for OutboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Events the server pushes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    MessageReceived(MessageReceived),
    UserOnline(String),
    UserOffline(String),
    OnlineUsers(Vec<String>),
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::MessageReceived(_) => "messageReceived",
            InboundEvent::UserOnline(_) => "userOnline",
            InboundEvent::UserOffline(_) => "userOffline",
            InboundEvent::OnlineUsers(_) => "onlineUsers",
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            InboundEvent::MessageReceived(_) => Topic::Chat,
            InboundEvent::UserOnline(_)
            | InboundEvent::UserOffline(_)
            | InboundEvent::OnlineUsers(_) => Topic::Presence,
        }
    }

    /// `Ok(None)` for packets that are not events or name an event we do not handle.
    pub fn from_packet(packet: &SocketPacket) -> Result<Option<Self>> {
        let Some((name, payload)) = packet.event_parts() else {
            return Ok(None);
        };

        let event = match name {
            "messageReceived" => {
                InboundEvent::MessageReceived(serde_json::from_value(payload.clone())?)
            }
            "userOnline" => InboundEvent::UserOnline(Self::user_id(payload)?),
            "userOffline" => InboundEvent::UserOffline(Self::user_id(payload)?),
            "onlineUsers" => InboundEvent::OnlineUsers(serde_json::from_value(payload.clone())?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }

    fn user_id(payload: &Value) -> Result<String> {
        Ok(serde_json::from_value::<UserIdPayload>(payload.clone())?.into_id())
    }
}

impl Display for InboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_outbound_packet_shape() {
        let event = OutboundEvent::SendMessage(SendMessage {
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            user_id: String::from("u1"),
            target_user_id: String::from("u2"),
            text: String::from("hello"),
        });

        let packet = event.to_packet("/").unwrap();
        let (name, payload) = packet.event_parts().unwrap();
        assert_eq!(name, "sendMessage");
        assert_eq!(payload["firstName"], "Ada");
        assert_eq!(payload["targetUserId"], "u2");
    }

    #[test]
    fn test_inbound_presence_events() {
        let snapshot = SocketPacket::event("/", "onlineUsers", json!(["u1", "u2"]));
        assert_eq!(
            InboundEvent::from_packet(&snapshot).unwrap(),
            Some(InboundEvent::OnlineUsers(vec![
                String::from("u1"),
                String::from("u2")
            ]))
        );

        let bare = SocketPacket::event("/", "userOffline", json!("u1"));
        assert_eq!(
            InboundEvent::from_packet(&bare).unwrap(),
            Some(InboundEvent::UserOffline(String::from("u1")))
        );

        let wrapped = SocketPacket::event("/", "userOnline", json!({"userId": "u3"}));
        assert_eq!(
            InboundEvent::from_packet(&wrapped).unwrap(),
            Some(InboundEvent::UserOnline(String::from("u3")))
        );
    }

    #[test]
    fn test_inbound_message_without_timestamp() {
        let packet = SocketPacket::event(
            "/",
            "messageReceived",
            json!({"firstName": "Ada", "lastName": "L", "text": "hi"}),
        );

        let event = InboundEvent::from_packet(&packet).unwrap();
        assert_eq!(event.as_ref().map(InboundEvent::topic), Some(Topic::Chat));
        match event {
            Some(InboundEvent::MessageReceived(message)) => {
                assert_eq!(message.text, "hi");
                assert!(message.created_at.is_none());
            }
            other => panic!("Unexpected event {other:?}"),
        }
        assert_eq!(
            InboundEvent::UserOffline(String::from("u1")).topic(),
            Topic::Presence
        );
    }

    #[test]
    fn test_unknown_and_non_event_packets() {
        let unknown = SocketPacket::event("/", "typing", json!({}));
        assert_eq!(InboundEvent::from_packet(&unknown).unwrap(), None);
        assert_eq!(
            InboundEvent::from_packet(&SocketPacket::connect("/")).unwrap(),
            None
        );
    }
}
