use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
    api::ApiClient,
    store::{Action, Store},
    types::{AnonymousReason, Route, RouteDecision, SessionPhase},
};

/// Decides whether a route renders, probing the backend for a session once.
#[derive(Clone)]
pub struct RouteGuard {
    api: ApiClient,
    store: Store,
    probe: Arc<OnceCell<SessionPhase>>,
}

impl RouteGuard {
    pub fn new(api: ApiClient, store: Store) -> Self {
        Self {
            api,
            store,
            probe: Arc::new(OnceCell::new()),
        }
    }

    /// Runs the profile probe on first use; concurrent callers share it.
    /// Returns the session phase as the store currently sees it.
    pub async fn check(&self) -> SessionPhase {
        self.probe.get_or_init(|| self.probe_session()).await;
        self.store.phase().await
    }

    /// Whether the one-time probe has completed.
    pub fn probed(&self) -> bool {
        self.probe.initialized()
    }

    async fn probe_session(&self) -> SessionPhase {
        if self.store.user().await.is_some() {
            return SessionPhase::Authenticated;
        }

        self.store.dispatch(Action::BeginProbe).await;
        match self.api.view_profile().await {
            Ok(user) => {
                info!("Session restored for {}.", user.id);
                self.store.dispatch(Action::SetUser(user)).await;
                SessionPhase::Authenticated
            }
            Err(error) if error.is_unauthorized() => {
                self.store.handle_unauthorized().await;
                SessionPhase::Anonymous(AnonymousReason::Unauthorized)
            }
            // Unreachable backends are treated as logged out too.
            Err(error) => {
                warn!("Session probe failed: {error}");
                self.store
                    .dispatch(Action::ClearSession(AnonymousReason::Unreachable))
                    .await;
                self.store.navigate(Route::Login).await;
                SessionPhase::Anonymous(AnonymousReason::Unreachable)
            }
        }
    }

    pub async fn resolve(&self, route: Route) -> RouteDecision {
        if route.is_public() {
            return RouteDecision::Render(route);
        }

        if self.check().await.is_authenticated() {
            RouteDecision::Render(route)
        } else {
            RouteDecision::Redirect(Route::Login)
        }
    }
}
