use std::{
    collections::HashSet,
    sync::{
        Arc, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    config::ClientConfig,
    connection::RealtimeConnection,
    error::ClientError,
    polling,
    protocol_objects::{InboundEvent, OutboundEvent, SocketPacket, UserStatus},
    subscription::RealtimeSubscription,
    types::{
        DEFAULT_NAMESPACE, MAX_RECONNECTION_DELAY, PacketReceivedCallback, Result, Topic,
        TransportKind,
    },
    utils::socket_endpoint,
};

/// Process-wide realtime connection.
///
/// Views call [`RealtimeHub::subscribe`] instead of opening their own socket.
/// The first subscription connects; dropping the last one disconnects. A
/// connection lost while subscribers remain is redialled in the background.
/// Emits are fire-and-forget: no acknowledgement, no retry, no ordering
/// guarantee across reconnects.
#[derive(Clone)]
pub struct RealtimeHub {
    inner: Arc<HubInner>,
}

pub(crate) struct HubInner {
    base_url: String,
    transports: Vec<TransportKind>,
    reconnection_attempts: u32,
    reconnection_delay: Duration,
    connect_timeout: Duration,
    api: ApiClient,
    presence: broadcast::Sender<InboundEvent>,
    chat: broadcast::Sender<InboundEvent>,
    subscribers: AtomicUsize,
    /// Set when the user session ends; cleared by the next subscribe.
    suspended: AtomicBool,
    /// Users announced online through this hub.
    present_users: std::sync::Mutex<HashSet<String>>,
    /// Every live subscription holds a clone; cancelled when the session ends.
    session: std::sync::Mutex<CancellationToken>,
    connection: Mutex<Option<RealtimeConnection>>,
}

impl RealtimeHub {
    pub fn new(config: &ClientConfig, api: ApiClient) -> Self {
        let (presence, _) = broadcast::channel(config.event_buffer.max(1));
        let (chat, _) = broadcast::channel(config.event_buffer.max(1));

        Self {
            inner: Arc::new(HubInner {
                base_url: String::from(config.socket_url()),
                transports: config.transports.clone(),
                reconnection_attempts: config.reconnection_attempts.max(1),
                reconnection_delay: config.reconnection_delay,
                connect_timeout: config.connect_timeout,
                api,
                presence,
                chat,
                subscribers: AtomicUsize::new(0),
                suspended: AtomicBool::new(false),
                present_users: std::sync::Mutex::new(HashSet::new()),
                session: std::sync::Mutex::new(CancellationToken::new()),
                connection: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<HubInner>) -> Self {
        Self { inner }
    }

    /// Registers a listener on `topic` and makes sure the shared connection
    /// is up.
    pub async fn subscribe(&self, topic: Topic) -> Result<RealtimeSubscription> {
        // Receiver first so nothing sent right after connect is missed.
        let receiver = self.inner.channel(topic).subscribe();
        self.inner.subscribers.fetch_add(1, Ordering::SeqCst);
        self.inner.suspended.store(false, Ordering::SeqCst);
        let subscription = RealtimeSubscription::new(
            receiver,
            self.inner.session_token(),
            Arc::clone(&self.inner),
        );

        self.inner.ensure_connected().await?;
        Ok(subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load(Ordering::SeqCst)
    }

    pub async fn is_connected(&self) -> bool {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .is_some_and(RealtimeConnection::is_alive)
    }

    /// Current transport, if connected.
    pub async fn transport(&self) -> Option<TransportKind> {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .filter(|connection| connection.is_alive())
            .map(RealtimeConnection::transport)
    }

    pub async fn emit(&self, event: OutboundEvent) -> Result<()> {
        let packet = event.to_packet(DEFAULT_NAMESPACE)?;

        if self.subscriber_count() > 0 && !self.inner.suspended.load(Ordering::SeqCst) {
            self.inner.ensure_connected().await?;
        }

        let guard = self.inner.connection.lock().await;
        match guard.as_ref() {
            Some(connection) if connection.is_alive() => {
                debug!("Emitting {event}");
                connection.send(packet)
            }
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Closes the shared connection regardless of subscribers. The next
    /// subscribe or emit reconnects.
    pub async fn disconnect(&self) -> Result<()> {
        let connection = self.inner.connection.lock().await.take();
        if let Some(connection) = connection {
            info!("Closing realtime connection {}.", connection.sid());
            return connection.close().await;
        }

        Ok(())
    }

    /// Ends the realtime side of a user session. Users registered by a
    /// [`PresenceTracker`](crate::presence::PresenceTracker) are announced
    /// offline, every subscription stops receiving and the connection
    /// closes. Emits fail with [`ClientError::NotConnected`] until the next
    /// subscribe.
    pub async fn end_session(&self) -> Result<()> {
        self.inner.suspended.store(true, Ordering::SeqCst);
        let users: Vec<String> = self
            .inner
            .present_users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        {
            let guard = self.inner.connection.lock().await;
            if let Some(connection) = guard.as_ref().filter(|connection| connection.is_alive()) {
                for user_id in users {
                    let packet = OutboundEvent::UserOffline(UserStatus::new(&user_id))
                        .to_packet(DEFAULT_NAMESPACE)?;
                    if let Err(error) = connection.send(packet) {
                        debug!("Could not announce {user_id} offline: {error}");
                    }
                }
            }
        }

        self.inner.end_subscriptions();
        self.disconnect().await
    }

    pub(crate) fn register_presence(&self, user_id: &str) {
        self.inner
            .present_users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(String::from(user_id));
    }

    pub(crate) fn unregister_presence(&self, user_id: &str) {
        self.inner
            .present_users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
    }
}

impl HubInner {
    fn channel(&self, topic: Topic) -> &broadcast::Sender<InboundEvent> {
        match topic {
            Topic::Presence => &self.presence,
            Topic::Chat => &self.chat,
        }
    }

    fn session_token(&self) -> CancellationToken {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn end_subscriptions(&self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session.cancel();
        *session = CancellationToken::new();
    }

    async fn ensure_connected(self: &Arc<Self>) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.as_ref().is_some_and(RealtimeConnection::is_alive) {
            return Ok(());
        }

        if guard.take().is_some() {
            debug!("Previous realtime connection is dead, reconnecting.");
        }

        let connection = self.connect().await?;
        self.watch(&connection);
        *guard = Some(connection);
        Ok(())
    }

    /// Redials once `connection` ends, unless it was closed on purpose.
    fn watch(self: &Arc<Self>, connection: &RealtimeConnection) {
        let closed = connection.closed_token();
        let sid = String::from(connection.sid());
        let inner = Arc::downgrade(self);

        tokio::spawn(async move {
            closed.cancelled().await;
            if let Some(inner) = inner.upgrade() {
                inner.redial(&sid).await;
            }
        });
    }

    async fn redial(self: &Arc<Self>, sid: &str) {
        {
            // Deliberate closes take the connection out of the slot first.
            let guard = self.connection.lock().await;
            let dropped = guard.as_ref().is_some_and(|connection| connection.sid() == sid);
            if !dropped
                || self.subscribers.load(Ordering::SeqCst) == 0
                || self.suspended.load(Ordering::SeqCst)
            {
                return;
            }
        }

        warn!("Realtime connection {sid} lost, reconnecting.");
        if let Err(error) = self.ensure_connected().await {
            warn!("Realtime reconnect failed: {error}");
        }
    }

    async fn connect(&self) -> Result<RealtimeConnection> {
        let mut backoff = self.reconnection_delay;
        let mut last_error = None;

        info!("Attempting realtime connection to {}.", self.base_url);

        for attempt in 0..self.reconnection_attempts {
            for transport in &self.transports {
                match self.open(*transport).await {
                    Ok(connection) => {
                        info!(
                            "Realtime connection {} established over {transport}.",
                            connection.sid()
                        );
                        return Ok(connection);
                    }
                    Err(error) => {
                        debug!("Connection attempt over {transport} failed: {error}");
                        last_error = Some(error);
                    }
                }
            }

            if attempt + 1 < self.reconnection_attempts {
                info!(
                    "Retry {}/{}: next attempt in {backoff:?}",
                    attempt + 1,
                    self.reconnection_attempts
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_RECONNECTION_DELAY);
            }
        }

        let error = last_error.unwrap_or(ClientError::NotConnected);
        warn!(
            "Realtime connection failed after {} attempts: {error}",
            self.reconnection_attempts
        );
        Err(error)
    }

    async fn open(&self, transport: TransportKind) -> Result<RealtimeConnection> {
        let presence = self.presence.clone();
        let chat = self.chat.clone();
        let callback: PacketReceivedCallback = Arc::new(move |packet: SocketPacket| {
            match InboundEvent::from_packet(&packet) {
                Ok(Some(event)) => {
                    let channel = match event.topic() {
                        Topic::Presence => &presence,
                        Topic::Chat => &chat,
                    };
                    if channel.send(event).is_err() {
                        debug!("Inbound event dropped, no subscribers.");
                    }
                }
                Ok(None) => debug!("Ignoring {packet}"),
                Err(error) => warn!("Malformed payload in {packet}: {error}"),
            }
        });

        match transport {
            TransportKind::Websocket => {
                RealtimeConnection::websocket(
                    &socket_endpoint(&self.base_url, TransportKind::Websocket),
                    self.api.cookie_header(&self.base_url),
                    callback,
                    self.connect_timeout,
                )
                .await
            }
            TransportKind::Polling => {
                polling::connect(self.api.http(), &self.base_url, callback, self.connect_timeout)
                    .await
            }
        }
    }

    /// Called when a subscription is dropped.
    pub(crate) fn release(self: &Arc<Self>) {
        if self.subscribers.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }

        let inner = Arc::clone(self);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { inner.close_if_idle().await });
            }
            Err(_) => {
                // No runtime to await on; dropping the connection cancels its tasks.
                if let Ok(mut guard) = inner.connection.try_lock() {
                    guard.take();
                }
            }
        }
    }

    async fn close_if_idle(&self) {
        let mut guard = self.connection.lock().await;
        if self.subscribers.load(Ordering::SeqCst) > 0 {
            return;
        }

        if let Some(connection) = guard.take() {
            debug!("Last subscriber gone, closing realtime connection.");
            if let Err(error) = connection.close().await {
                debug!("Realtime connection closed with errors: {error}");
            }
        }
    }
}
