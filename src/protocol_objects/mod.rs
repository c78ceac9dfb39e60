mod chat;
mod engine_packet;
mod event;
mod handshake;
mod presence;
mod socket_packet;

pub use chat::{JoinChat, MessageReceived, SendMessage};
pub use engine_packet::{EnginePacket, RECORD_SEPARATOR};
pub use event::{InboundEvent, OutboundEvent};
pub use handshake::{ConnectAck, Handshake};
pub use presence::UserStatus;
pub use socket_packet::{SocketPacket, SocketPacketKind};
