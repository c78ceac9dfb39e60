//! Engine.IO long-polling transport, used when the websocket cannot be opened.

use std::time::Duration;

use reqwest::{Client, header::CONTENT_TYPE};
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    api::error_for_status,
    connection::{RealtimeConnection, namespace_reply, route_engine_packet},
    error::ClientError,
    protocol_objects::{EnginePacket, Handshake, SocketPacket},
    types::{DEFAULT_NAMESPACE, PacketReceivedCallback, Result, TransportKind},
    utils::socket_endpoint,
};

pub(crate) async fn connect(
    http: &Client,
    base_url: &str,
    packet_received_callback: PacketReceivedCallback,
    connect_timeout: Duration,
) -> Result<RealtimeConnection> {
    let endpoint = socket_endpoint(base_url, TransportKind::Polling);

    let (handshake, session_url) = timeout(connect_timeout, open_session(http, &endpoint))
        .await
        .map_err(|_| ClientError::Timeout(connect_timeout, "opening polling session"))??;

    let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
    let cancellation_token = CancellationToken::new();

    let poll_join_handle = tokio::spawn(poll_loop(
        http.clone(),
        session_url.clone(),
        sender.clone(),
        packet_received_callback,
        handshake.liveness_window(),
        cancellation_token.clone(),
    ));
    let send_join_handle = tokio::spawn(send_loop(
        http.clone(),
        session_url,
        receiver,
        cancellation_token.clone(),
    ));

    Ok(RealtimeConnection::from_parts(
        sender,
        TransportKind::Polling,
        handshake.sid,
        vec![poll_join_handle, send_join_handle],
        cancellation_token,
    ))
}

async fn open_session(http: &Client, endpoint: &str) -> Result<(Handshake, String)> {
    let packets = poll(http, endpoint, None).await?;
    let handshake = match packets.into_iter().next() {
        Some(EnginePacket::Open(handshake)) => handshake,
        Some(other) => {
            return Err(ClientError::protocol(
                &other.encode(),
                "expected engine open packet",
            ));
        }
        None => return Err(ClientError::protocol("", "empty polling handshake")),
    };

    debug!("Engine session {} opened over polling.", handshake.sid);
    let session_url = format!("{endpoint}&sid={}", handshake.sid);

    post(
        http,
        &session_url,
        &[EnginePacket::Message(
            SocketPacket::connect(DEFAULT_NAMESPACE).encode(),
        )],
    )
    .await?;

    let window = handshake.liveness_window();
    loop {
        for packet in poll(http, &session_url, Some(window)).await? {
            match packet {
                EnginePacket::Ping(probe) => {
                    post(http, &session_url, &[EnginePacket::Pong(probe)]).await?;
                }
                EnginePacket::Message(data) => {
                    if namespace_reply(&data)?.is_some() {
                        return Ok((handshake, session_url));
                    }
                }
                EnginePacket::Close => return Err(ClientError::ConnectionClosed),
                _ => {}
            }
        }
    }
}

async fn poll(http: &Client, url: &str, window: Option<Duration>) -> Result<Vec<EnginePacket>> {
    let mut request = http.get(url);
    if let Some(window) = window {
        request = request.timeout(window);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(error_for_status(status, &body));
    }

    Ok(decode_batch(&body))
}

/// Decodes every packet in a polling body, skipping the ones that fail.
fn decode_batch(body: &str) -> Vec<EnginePacket> {
    EnginePacket::decode_payload(body)
        .filter_map(|decoded| match decoded {
            Ok(packet) => Some(packet),
            Err(error) => {
                warn!("Dropping undecodable engine packet: {error}");
                None
            }
        })
        .collect()
}

async fn post(http: &Client, url: &str, packets: &[EnginePacket]) -> Result<()> {
    let response = http
        .post(url)
        .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(EnginePacket::encode_payload(packets))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(error_for_status(status, &body));
    }

    Ok(())
}

async fn poll_loop(
    http: Client,
    session_url: String,
    sender: UnboundedSender<EnginePacket>,
    packet_received_callback: PacketReceivedCallback,
    liveness_window: Duration,
    cancellation_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            polled = poll(&http, &session_url, Some(liveness_window)) => {
                match polled {
                    Ok(packets) => {
                        for packet in packets {
                            if !route_engine_packet(packet, &sender, &packet_received_callback) {
                                cancellation_token.cancel();
                                return Ok(());
                            }
                        }
                    }
                    Err(ClientError::HttpError(error)) if error.is_timeout() => {
                        warn!("No traffic from server within {liveness_window:?}, dropping polling session.");
                        break;
                    }
                    Err(error) => {
                        cancellation_token.cancel();
                        return Err(error);
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

async fn send_loop(
    http: Client,
    session_url: String,
    mut receiver: UnboundedReceiver<EnginePacket>,
    cancellation_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            packet = receiver.recv() => {
                let Some(packet) = packet else {
                    debug!("polling: canceling due to None received from receiver.");
                    cancellation_token.cancel();
                    break;
                };

                let mut batch = vec![packet];
                while let Ok(more) = receiver.try_recv() {
                    batch.push(more);
                }
                if let Err(error) = post(&http, &session_url, &batch).await {
                    warn!("Polling send failed, dropping session: {error}");
                    cancellation_token.cancel();
                    return Err(error);
                }
            }

            _ = cancellation_token.cancelled() => {
                let mut batch = vec![];
                while let Ok(packet) = receiver.try_recv() {
                    batch.push(packet);
                }
                if !batch.is_empty() && let Err(error) = post(&http, &session_url, &batch).await {
                    debug!("Failed to flush polling packets on close: {error}");
                }
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_batch_skips_bad_packets() {
        let body = "2\u{1e}bAQID\u{1e}9what\u{1e}42[\"userOffline\",\"u1\"]\u{1e}";
        assert_eq!(
            decode_batch(body),
            vec![
                EnginePacket::Ping(None),
                EnginePacket::Message(String::from("2[\"userOffline\",\"u1\"]")),
            ]
        );
        assert!(decode_batch("").is_empty());
    }
}
