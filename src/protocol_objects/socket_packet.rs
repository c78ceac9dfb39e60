use std::fmt::Display;

use serde_json::Value;

use crate::{
    error::ClientError,
    types::{DEFAULT_NAMESPACE, Result},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl SocketPacketKind {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(SocketPacketKind::Connect),
            '1' => Some(SocketPacketKind::Disconnect),
            '2' => Some(SocketPacketKind::Event),
            '3' => Some(SocketPacketKind::Ack),
            '4' => Some(SocketPacketKind::ConnectError),
            '5' => Some(SocketPacketKind::BinaryEvent),
            '6' => Some(SocketPacketKind::BinaryAck),
            _ => None,
        }
    }

    fn as_char(&self) -> char {
        match self {
            SocketPacketKind::Connect => '0',
            SocketPacketKind::Disconnect => '1',
            SocketPacketKind::Event => '2',
            SocketPacketKind::Ack => '3',
            SocketPacketKind::ConnectError => '4',
            SocketPacketKind::BinaryEvent => '5',
            SocketPacketKind::BinaryAck => '6',
        }
    }
}

/// Socket.IO v5 packet, carried inside an Engine.IO `message`.
#[derive(Clone, Debug, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Connect,
            namespace: String::from(namespace),
            id: None,
            data: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Disconnect,
            namespace: String::from(namespace),
            id: None,
            data: None,
        }
    }

    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        Self {
            kind: SocketPacketKind::Event,
            namespace: String::from(namespace),
            id: None,
            data: Some(Value::Array(vec![Value::String(String::from(name)), payload])),
        }
    }

    /// Event name and first argument, if this is an event packet.
    pub fn event_parts(&self) -> Option<(&str, &Value)> {
        if self.kind != SocketPacketKind::Event {
            return None;
        }

        let items = self.data.as_ref()?.as_array()?;
        let name = items.first()?.as_str()?;
        Some((name, items.get(1).unwrap_or(&Value::Null)))
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.as_char());

        if self.namespace != DEFAULT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }

        if let Some(id) = self.id {
            out.push_str(&id.to_string());
        }

        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }

        out
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .and_then(SocketPacketKind::from_char)
            .ok_or_else(|| ClientError::protocol(text, "unknown socket packet type"))?;

        if matches!(
            kind,
            SocketPacketKind::BinaryEvent | SocketPacketKind::BinaryAck
        ) {
            return Err(ClientError::protocol(
                text,
                "binary socket packets are not supported",
            ));
        }

        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(index) => {
                    let namespace = &rest[..index];
                    rest = &rest[index + 1..];
                    namespace
                }
                None => {
                    let namespace = rest;
                    rest = "";
                    namespace
                }
            }
        } else {
            DEFAULT_NAMESPACE
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse()
                    .map_err(|_| ClientError::protocol(text, "ack id out of range"))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace: String::from(namespace),
            id,
            data,
        })
    }
}

impl Display for SocketPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.event_parts() {
            Some((name, _)) => write!(f, "event '{name}' on {}", self.namespace),
            None => write!(f, "{:?} on {}", self.kind, self.namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_connect_and_event() {
        assert_eq!(SocketPacket::connect("/").encode(), "0");
        assert_eq!(SocketPacket::disconnect("/").encode(), "1");
        assert_eq!(SocketPacket::connect("/admin").encode(), "0/admin,");

        let packet = SocketPacket::event("/", "joinUserStatus", json!({"userId": "u1"}));
        assert_eq!(packet.encode(), r#"2["joinUserStatus",{"userId":"u1"}]"#);
    }

    #[test]
    fn test_decode_namespace_and_ack_id() {
        let packet = SocketPacket::decode(r#"2/chat,12["messageReceived",{"text":"hi"}]"#)
            .expect("Failed to decode event packet.");

        assert_eq!(packet.kind, SocketPacketKind::Event);
        assert_eq!(packet.namespace, "/chat");
        assert_eq!(packet.id, Some(12));
        let (name, payload) = packet.event_parts().expect("Expected event parts.");
        assert_eq!(name, "messageReceived");
        assert_eq!(payload["text"], "hi");
    }

    #[test]
    fn test_decode_connect_reply() {
        let packet = SocketPacket::decode(r#"0{"sid":"abc"}"#).unwrap();
        assert_eq!(packet.kind, SocketPacketKind::Connect);
        assert_eq!(packet.namespace, "/");
        assert_eq!(packet.data, Some(json!({"sid": "abc"})));

        let bare = SocketPacket::decode("1").unwrap();
        assert_eq!(bare.kind, SocketPacketKind::Disconnect);
        assert!(bare.data.is_none());
    }

    #[test]
    fn test_decode_rejects_binary_and_garbage() {
        assert!(SocketPacket::decode(r#"51-["upload",{"_placeholder":true,"num":0}]"#).is_err());
        assert!(SocketPacket::decode("x").is_err());
        assert!(SocketPacket::decode("2[not json").is_err());
    }

    #[test]
    fn test_event_parts_without_payload() {
        let packet = SocketPacket::decode(r#"2["ping"]"#).unwrap();
        let (name, payload) = packet.event_parts().unwrap();
        assert_eq!(name, "ping");
        assert!(payload.is_null());
    }
}
