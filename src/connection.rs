use std::time::Duration;

use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use reqwest::header::{COOKIE, HeaderValue};
use tokio::{
    net::TcpStream,
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message as TMessage, client::IntoClientRequest},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::ClientError,
    protocol_objects::{ConnectAck, EnginePacket, Handshake, SocketPacket, SocketPacketKind},
    types::{DEFAULT_NAMESPACE, PacketReceivedCallback, Result, TransportKind},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One live Engine.IO session, over either transport.
pub(crate) struct RealtimeConnection {
    sender: UnboundedSender<EnginePacket>,
    transport: TransportKind,
    sid: String,
    tasks: Vec<JoinHandle<Result<()>>>,
    cancellation_token: CancellationToken,
}

impl RealtimeConnection {
    pub(crate) fn from_parts(
        sender: UnboundedSender<EnginePacket>,
        transport: TransportKind,
        sid: String,
        tasks: Vec<JoinHandle<Result<()>>>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            sender,
            transport,
            sid,
            tasks,
            cancellation_token,
        }
    }

    pub(crate) async fn websocket(
        url: &str,
        cookie: Option<HeaderValue>,
        packet_received_callback: PacketReceivedCallback,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let mut request = url.into_client_request()?;
        if let Some(cookie) = cookie {
            request.headers_mut().insert(COOKIE, cookie);
        }

        let (mut ws_stream, _) = timeout(connect_timeout, connect_async(request))
            .await
            .map_err(|_| ClientError::Timeout(connect_timeout, "opening websocket"))??;

        let handshake = timeout(connect_timeout, Self::open_namespace(&mut ws_stream))
            .await
            .map_err(|_| ClientError::Timeout(connect_timeout, "joining namespace"))??;

        let (ws_sender, ws_receiver) = ws_stream.split();
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let cancellation_token = CancellationToken::new();

        let listen_join_handle = tokio::spawn(Self::listen(
            ws_receiver,
            sender.clone(),
            packet_received_callback,
            handshake.liveness_window(),
            cancellation_token.clone(),
        ));
        let send_join_handle = tokio::spawn(Self::ws_send_loop(
            receiver,
            ws_sender,
            cancellation_token.clone(),
        ));

        Ok(Self::from_parts(
            sender,
            TransportKind::Websocket,
            handshake.sid,
            vec![listen_join_handle, send_join_handle],
            cancellation_token,
        ))
    }

    pub(crate) fn transport(&self) -> TransportKind {
        self.transport
    }

    pub(crate) fn sid(&self) -> &str {
        &self.sid
    }

    /// False once either task has stopped, even if the other is still running.
    pub(crate) fn is_alive(&self) -> bool {
        !self.cancellation_token.is_cancelled() && !self.sender.is_closed()
    }

    /// Cancelled when the session ends, for whatever reason.
    pub(crate) fn closed_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub(crate) fn send(&self, packet: SocketPacket) -> Result<()> {
        if !self.is_alive() {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(self.sender.send(EnginePacket::Message(packet.encode()))?)
    }

    pub(crate) async fn close(mut self) -> Result<()> {
        if self.is_alive() {
            // Best effort; the send loop flushes queued packets on cancel.
            let _ = self.sender.send(EnginePacket::Message(
                SocketPacket::disconnect(DEFAULT_NAMESPACE).encode(),
            ));
        }
        self.cancellation_token.cancel();

        let mut task_errors = vec![];
        for handle in std::mem::take(&mut self.tasks) {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => task_errors.push(error),
                Err(error) => task_errors.push(error.into()),
            }
        }

        if !task_errors.is_empty() {
            return Err(ClientError::MultipleTaskErrors {
                errors: task_errors,
            });
        }

        Ok(())
    }

    /// Reads the engine `open` packet, then joins the default namespace.
    async fn open_namespace(ws_stream: &mut WsStream) -> Result<Handshake> {
        let handshake = loop {
            match Self::next_engine_packet(ws_stream).await? {
                EnginePacket::Open(handshake) => break handshake,
                EnginePacket::Noop => continue,
                other => {
                    return Err(ClientError::protocol(
                        &other.encode(),
                        "expected engine open packet",
                    ));
                }
            }
        };

        debug!("Engine session {} opened over websocket.", handshake.sid);
        let connect = EnginePacket::Message(SocketPacket::connect(DEFAULT_NAMESPACE).encode());
        ws_stream.send(TMessage::Text(connect.encode())).await?;

        loop {
            match Self::next_engine_packet(ws_stream).await? {
                EnginePacket::Ping(probe) => {
                    ws_stream
                        .send(TMessage::Text(EnginePacket::Pong(probe).encode()))
                        .await?;
                }
                EnginePacket::Message(data) => {
                    if namespace_reply(&data)?.is_some() {
                        return Ok(handshake);
                    }
                }
                EnginePacket::Close => return Err(ClientError::ConnectionClosed),
                _ => {}
            }
        }
    }

    async fn next_engine_packet(ws_stream: &mut WsStream) -> Result<EnginePacket> {
        loop {
            match ws_stream.next().await {
                Some(Ok(TMessage::Text(text))) => return EnginePacket::decode(&text),
                Some(Ok(TMessage::Close(_))) | None => return Err(ClientError::ConnectionClosed),
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Err(error.into()),
            }
        }
    }

    async fn listen(
        mut ws_receiver: SplitStream<WsStream>,
        sender: UnboundedSender<EnginePacket>,
        packet_received_callback: PacketReceivedCallback,
        liveness_window: Duration,
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                received = timeout(liveness_window, ws_receiver.next()) => {
                    match received {
                        Err(_) => {
                            warn!("No traffic from server within {liveness_window:?}, dropping websocket.");
                            break;
                        }
                        Ok(None) | Ok(Some(Ok(TMessage::Close(_)))) => {
                            debug!("Websocket closed by server.");
                            break;
                        }
                        Ok(Some(Ok(TMessage::Text(text)))) => {
                            if !route_text(&text, &sender, &packet_received_callback) {
                                break;
                            }
                        }
                        Ok(Some(Ok(_))) => {}
                        Ok(Some(Err(error))) => {
                            cancellation_token.cancel();
                            return Err(error.into());
                        }
                    }
                }

                _ = cancellation_token.cancelled() => {
                    break;
                }
            }
        }

        cancellation_token.cancel();
        Ok(())
    }

    async fn ws_send_loop(
        mut receiver: UnboundedReceiver<EnginePacket>,
        mut ws_sender: SplitSink<WsStream, TMessage>,
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                packet = receiver.recv() => {
                    if let Some(packet) = packet {
                        if let Err(error) = ws_sender.send(TMessage::Text(packet.encode())).await {
                            cancellation_token.cancel();
                            return Err(error.into());
                        }
                    } else {
                        debug!("connection: canceling due to None received from receiver.");
                        cancellation_token.cancel();
                        break;
                    }
                },

                _ = cancellation_token.cancelled() => {
                    while let Ok(packet) = receiver.try_recv() {
                        if ws_sender.send(TMessage::Text(packet.encode())).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            }
        }

        let _ = ws_sender.close().await;
        Ok(())
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// Interprets a reply to the namespace `CONNECT`. `Ok(None)` means the
/// packet was something else and the caller should keep waiting.
pub(crate) fn namespace_reply(data: &str) -> Result<Option<ConnectAck>> {
    let packet = SocketPacket::decode(data)?;
    match packet.kind {
        SocketPacketKind::Connect => {
            let ack: ConnectAck = packet
                .data
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            debug!("Joined namespace {} as {:?}.", packet.namespace, ack.sid);
            Ok(Some(ack))
        }
        SocketPacketKind::ConnectError => Err(ClientError::Handshake {
            reason: String::from(data),
        }),
        _ => {
            debug!("Skipping packet received before namespace connect.");
            Ok(None)
        }
    }
}

fn route_text(
    text: &str,
    sender: &UnboundedSender<EnginePacket>,
    packet_received_callback: &PacketReceivedCallback,
) -> bool {
    match EnginePacket::decode(text) {
        Ok(packet) => route_engine_packet(packet, sender, packet_received_callback),
        Err(error) => {
            warn!("Dropping undecodable engine packet: {error}");
            true
        }
    }
}

/// Answers pings and forwards socket packets. Returns `false` once the
/// server has ended the session.
pub(crate) fn route_engine_packet(
    packet: EnginePacket,
    sender: &UnboundedSender<EnginePacket>,
    packet_received_callback: &PacketReceivedCallback,
) -> bool {
    match packet {
        EnginePacket::Ping(probe) => {
            if sender.send(EnginePacket::Pong(probe)).is_err() {
                debug!("Pong dropped, send loop already stopped.");
            }
            true
        }
        EnginePacket::Message(data) => match SocketPacket::decode(&data) {
            Ok(packet) if packet.kind == SocketPacketKind::Disconnect => {
                debug!("Server disconnected namespace {}.", packet.namespace);
                false
            }
            Ok(packet) => {
                packet_received_callback(packet);
                true
            }
            Err(error) => {
                warn!("Dropping undecodable socket packet: {error}");
                true
            }
        },
        EnginePacket::Close => false,
        _ => true,
    }
}
