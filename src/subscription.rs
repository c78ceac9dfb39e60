use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    error::ClientError,
    protocol_objects::{InboundEvent, OutboundEvent},
    realtime::{HubInner, RealtimeHub},
    types::Result,
};

/// A listener on the shared realtime connection. Holding one keeps the
/// connection open.
pub struct RealtimeSubscription {
    receiver: broadcast::Receiver<InboundEvent>,
    ended: CancellationToken,
    inner: Arc<HubInner>,
}

impl RealtimeSubscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<InboundEvent>,
        ended: CancellationToken,
        inner: Arc<HubInner>,
    ) -> Self {
        Self {
            receiver,
            ended,
            inner,
        }
    }

    /// Next inbound event, or `None` once the user session has ended.
    /// Events missed because this listener fell behind are skipped with a
    /// warning.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        loop {
            tokio::select! {
                biased;

                _ = self.ended.cancelled() => return None,

                received = self.receiver.recv() => match received {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Realtime listener lagged, skipped {skipped} events.");
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        if self.is_ended() {
            return None;
        }

        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Realtime listener lagged, skipped {skipped} events.");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn hub(&self) -> RealtimeHub {
        RealtimeHub::from_inner(Arc::clone(&self.inner))
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_cancelled()
    }

    pub async fn emit(&self, event: OutboundEvent) -> Result<()> {
        if self.is_ended() {
            return Err(ClientError::NotConnected);
        }
        self.hub().emit(event).await
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.inner.release();
    }
}
