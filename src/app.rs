use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    auth::AuthService,
    chat::ChatSession,
    config::ClientConfig,
    connections::ConnectionService,
    feed::FeedController,
    premium::MembershipService,
    presence::PresenceTracker,
    profile::ProfileService,
    realtime::RealtimeHub,
    session::RouteGuard,
    store::{Store, StoreEvent},
    types::Result,
};

/// Wires the shared HTTP client, store and realtime hub into the services.
///
/// Cheap to clone. Services built from the same `CommitHub` share one
/// cookie jar, one state container and one realtime connection.
#[derive(Clone)]
pub struct CommitHub {
    config: ClientConfig,
    api: ApiClient,
    store: Store,
    hub: RealtimeHub,
    guard: RouteGuard,
}

impl CommitHub {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let api = ApiClient::new(&config)?;
        let store = Store::new(config.event_buffer);
        let hub = RealtimeHub::new(&config, api.clone());
        let guard = RouteGuard::new(api.clone(), store.clone());
        spawn_session_teardown(&hub, &store);

        info!("CommitHub client ready for {}.", config.api_url);
        Ok(Self {
            config,
            api,
            store,
            hub,
            guard,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn realtime(&self) -> &RealtimeHub {
        &self.hub
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.api.clone(), self.store.clone())
    }

    pub fn profile(&self) -> ProfileService {
        ProfileService::new(self.api.clone(), self.store.clone())
    }

    pub fn connections(&self) -> ConnectionService {
        ConnectionService::new(self.api.clone(), self.store.clone())
    }

    pub fn feed(&self) -> FeedController {
        FeedController::new(
            self.api.clone(),
            self.store.clone(),
            self.config.feed_poll_interval,
        )
    }

    pub fn membership(&self) -> MembershipService {
        MembershipService::new(
            self.api.clone(),
            self.store.clone(),
            self.config.payment_verify_delay,
        )
    }

    pub async fn presence(&self, user_id: &str) -> Result<PresenceTracker> {
        PresenceTracker::start(&self.hub, user_id).await
    }

    pub async fn chat(&self, target_user_id: &str) -> Result<ChatSession> {
        ChatSession::open(&self.api, &self.store, &self.hub, target_user_id).await
    }
}

/// Closes the realtime side whenever the signed-in session ends. Runs until
/// the last store handle is dropped.
fn spawn_session_teardown(hub: &RealtimeHub, store: &Store) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("No runtime, realtime teardown on session end is disabled.");
        return;
    };

    let hub = hub.clone();
    let mut events = store.subscribe();
    runtime.spawn(async move {
        loop {
            match events.recv().await {
                Ok(StoreEvent::SessionEnded(reason)) => {
                    info!("Session ended ({reason:?}), closing realtime connection.");
                    if let Err(error) = hub.end_session().await {
                        debug!("Realtime connection closed with errors: {error}");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session teardown lagged, skipped {skipped} store events.");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[tokio::test]
    async fn test_rejects_invalid_url() {
        let result = CommitHub::new(ClientConfig::new("ftp://example.com"));
        assert!(matches!(result, Err(ClientError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_services_share_store() {
        let client = CommitHub::new(ClientConfig::default()).unwrap();
        let cloned = client.clone();
        let mut events = client.store().subscribe();

        cloned.store().navigate(crate::types::Route::Profile).await;

        assert_eq!(events.try_recv().unwrap(), crate::store::StoreEvent::StateChanged);
        assert_eq!(client.store().snapshot().await.route, Some(crate::types::Route::Profile));
        assert_eq!(client.realtime().subscriber_count(), 0);
    }
}
