use std::fmt::Display;

use crate::{error::ClientError, types::Result};

use super::handshake::Handshake;

/// Separator between packets in a long-polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Engine.IO v4 transport packet. Text encoding only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                // Handshake only has plain fields; serialization cannot fail.
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => String::from("1"),
            EnginePacket::Ping(probe) => format!("2{}", probe.as_deref().unwrap_or_default()),
            EnginePacket::Pong(probe) => format!("3{}", probe.as_deref().unwrap_or_default()),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => String::from("5"),
            EnginePacket::Noop => String::from("6"),
        }
    }

    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ClientError::protocol(text, "empty engine packet"))?;
        let data = chars.as_str();

        let optional = |data: &str| (!data.is_empty()).then(|| String::from(data));

        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(data)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(optional(data))),
            '3' => Ok(EnginePacket::Pong(optional(data))),
            '4' => Ok(EnginePacket::Message(String::from(data))),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            'b' => Err(ClientError::protocol(
                text,
                "binary engine packets are not supported",
            )),
            other => Err(ClientError::protocol(
                text,
                format!("unknown engine packet type '{other}'"),
            )),
        }
    }

    /// Splits a long-polling response body into packets, decoding each one
    /// on its own so a bad packet does not spoil the rest.
    pub fn decode_payload(body: &str) -> impl Iterator<Item = Result<Self>> + '_ {
        body.split(RECORD_SEPARATOR)
            .filter(|part| !part.is_empty())
            .map(Self::decode)
    }

    pub fn encode_payload(packets: &[Self]) -> String {
        packets
            .iter()
            .map(Self::encode)
            .collect::<Vec<_>>()
            .join(&RECORD_SEPARATOR.to_string())
    }
}

impl Display for EnginePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnginePacket::Open(_) => write!(f, "open"),
            EnginePacket::Close => write!(f, "close"),
            EnginePacket::Ping(_) => write!(f, "ping"),
            EnginePacket::Pong(_) => write!(f, "pong"),
            EnginePacket::Message(_) => write!(f, "message"),
            EnginePacket::Upgrade => write!(f, "upgrade"),
            EnginePacket::Noop => write!(f, "noop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .expect("Failed to decode open packet.");

        match packet {
            EnginePacket::Open(handshake) => {
                assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(handshake.upgrades, vec![String::from("websocket")]);
                assert_eq!(handshake.liveness_window().as_millis(), 45_000);
            }
            other => panic!("Expected open packet, got {other}"),
        }
    }

    #[test]
    fn test_decode_ping_and_message() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(None));
        assert_eq!(
            EnginePacket::decode("2probe").unwrap(),
            EnginePacket::Ping(Some(String::from("probe")))
        );
        assert_eq!(
            EnginePacket::decode(r#"42["userOnline","u1"]"#).unwrap(),
            EnginePacket::Message(String::from(r#"2["userOnline","u1"]"#))
        );
        assert_eq!(EnginePacket::Pong(None).encode(), "3");
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
        assert!(EnginePacket::decode("bAQID").is_err());
    }

    #[test]
    fn test_polling_payload_split() {
        let body = "2\u{1e}42[\"userOffline\",\"u1\"]\u{1e}6";
        let packets = EnginePacket::decode_payload(body)
            .collect::<Result<Vec<_>>>()
            .expect("Failed to split payload.");
        assert_eq!(
            packets,
            vec![
                EnginePacket::Ping(None),
                EnginePacket::Message(String::from("2[\"userOffline\",\"u1\"]")),
                EnginePacket::Noop,
            ]
        );

        let encoded = EnginePacket::encode_payload(&[
            EnginePacket::Pong(None),
            EnginePacket::Message(String::from("40")),
        ]);
        assert_eq!(encoded, "3\u{1e}440");
    }

    #[test]
    fn test_polling_payload_bad_packet_is_isolated() {
        let decoded: Vec<_> = EnginePacket::decode_payload("2\u{1e}bAQID\u{1e}6").collect();
        assert_eq!(decoded.len(), 3);
        assert!(decoded[0].is_ok());
        assert!(decoded[1].is_err());
        assert_eq!(decoded[2].as_ref().ok(), Some(&EnginePacket::Noop));
    }
}
