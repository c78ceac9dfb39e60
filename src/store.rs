use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::{
    api_objects::{ConnectionRequest, User},
    types::{AnonymousReason, DEFAULT_EVENT_BUFFER, Result, Route, SessionPhase},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    pub phase: SessionPhase,
    pub user: Option<User>,
    pub feed: Vec<User>,
    pub connections: Vec<User>,
    pub requests: Vec<ConnectionRequest>,
    pub route: Option<Route>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    BeginProbe,
    SetUser(User),
    ClearSession(AnonymousReason),
    SetFeed(Vec<User>),
    RemoveFromFeed(String),
    SetConnections(Vec<User>),
    SetRequests(Vec<ConnectionRequest>),
    RemoveRequest(String),
    Navigate(Route),
}

/// Notifications fanned out to every subscriber of the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    StateChanged,
    /// Pending request / connection counts may have changed.
    CountsChanged,
    LimitsChanged { remaining: Option<u32> },
    FeedUpdated,
    PremiumRequired,
    PaymentSucceeded,
    /// A signed-in user was cleared, by logout or a rejected session.
    SessionEnded(AnonymousReason),
    Navigate(Route),
}

pub fn reduce(state: &mut AppState, action: Action) {
    match action {
        Action::BeginProbe => {
            if state.user.is_none() {
                state.phase = SessionPhase::Checking;
            }
        }
        Action::SetUser(user) => {
            state.user = Some(user);
            state.phase = SessionPhase::Authenticated;
        }
        Action::ClearSession(reason) => {
            state.user = None;
            state.feed.clear();
            state.connections.clear();
            state.requests.clear();
            state.phase = SessionPhase::Anonymous(reason);
        }
        Action::SetFeed(feed) => state.feed = feed,
        Action::RemoveFromFeed(user_id) => state.feed.retain(|user| user.id != user_id),
        Action::SetConnections(connections) => state.connections = connections,
        Action::SetRequests(requests) => state.requests = requests,
        Action::RemoveRequest(request_id) => {
            state.requests.retain(|request| request.id != request_id)
        }
        Action::Navigate(route) => state.route = Some(route),
    }
}

/// Shared application state. Cheap to clone; every clone sees the same state.
#[derive(Clone)]
pub struct Store {
    state: Arc<Mutex<AppState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl Store {
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            state: Arc::new(Mutex::new(AppState::default())),
            events,
        }
    }

    pub async fn dispatch(&self, action: Action) {
        let navigation = match &action {
            Action::Navigate(route) => Some(route.clone()),
            _ => None,
        };

        debug!("Dispatching {action:?}");
        let ended = {
            let mut state = self.state.lock().await;
            let ended = match &action {
                Action::ClearSession(reason) if state.user.is_some() => Some(*reason),
                _ => None,
            };
            reduce(&mut state, action);
            ended
        };

        self.publish(StoreEvent::StateChanged);
        if let Some(reason) = ended {
            self.publish(StoreEvent::SessionEnded(reason));
        }
        if let Some(route) = navigation {
            self.publish(StoreEvent::Navigate(route));
        }
    }

    pub fn publish(&self, event: StoreEvent) {
        if self.events.send(event).is_err() {
            debug!("Store event published with no subscribers.");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.lock().await.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.lock().await.user.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    pub async fn navigate(&self, route: Route) {
        self.dispatch(Action::Navigate(route)).await;
    }

    /// Drops the session and sends the user to the login route.
    pub async fn handle_unauthorized(&self) {
        info!("Session rejected by backend, clearing user.");
        self.dispatch(Action::ClearSession(AnonymousReason::Unauthorized))
            .await;
        self.navigate(Route::Login).await;
    }

    /// Passes `result` through, clearing the session first if it is a 401.
    pub async fn intercept<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result
            && error.is_unauthorized()
        {
            self.handle_unauthorized().await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    fn user(id: &str) -> User {
        User {
            id: String::from(id),
            first_name: String::from(id),
            ..Default::default()
        }
    }

    #[test]
    fn test_reduce_session_lifecycle() {
        let mut state = AppState::default();
        assert_eq!(state.phase, SessionPhase::Unknown);

        reduce(&mut state, Action::BeginProbe);
        assert_eq!(state.phase, SessionPhase::Checking);

        reduce(&mut state, Action::SetUser(user("me")));
        reduce(&mut state, Action::SetFeed(vec![user("a"), user("b")]));
        assert!(state.phase.is_authenticated());

        reduce(&mut state, Action::ClearSession(AnonymousReason::LoggedOut));
        assert!(state.user.is_none());
        assert!(state.feed.is_empty());
        assert_eq!(
            state.phase,
            SessionPhase::Anonymous(AnonymousReason::LoggedOut)
        );
    }

    #[test]
    fn test_reduce_removals() {
        let mut state = AppState::default();
        reduce(&mut state, Action::SetFeed(vec![user("a"), user("b")]));
        reduce(&mut state, Action::RemoveFromFeed(String::from("a")));
        assert_eq!(state.feed, vec![user("b")]);

        reduce(&mut state, Action::RemoveFromFeed(String::from("zzz")));
        assert_eq!(state.feed.len(), 1);

        reduce(
            &mut state,
            Action::SetRequests(vec![ConnectionRequest {
                id: String::from("r1"),
                from_user_id: user("a"),
                status: None,
            }]),
        );
        reduce(&mut state, Action::RemoveRequest(String::from("r1")));
        assert!(state.requests.is_empty());
    }

    #[tokio::test]
    async fn test_intercept_unauthorized_navigates_once() {
        let store = Store::default();
        store.dispatch(Action::SetUser(user("me"))).await;
        let mut events = store.subscribe();

        let result: Result<()> = store.intercept(Err(ClientError::Unauthorized)).await;
        assert!(result.is_err());

        let published: Vec<StoreEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        let navigations: Vec<&Route> = published
            .iter()
            .filter_map(|event| match event {
                StoreEvent::Navigate(route) => Some(route),
                _ => None,
            })
            .collect();
        assert_eq!(navigations, vec![&Route::Login]);
        assert!(published.contains(&StoreEvent::SessionEnded(AnonymousReason::Unauthorized)));
        assert!(store.user().await.is_none());

        // Clearing an already anonymous session does not end it again.
        store.handle_unauthorized().await;
        let again: Vec<StoreEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert!(!again.iter().any(|event| matches!(event, StoreEvent::SessionEnded(_))));
        assert_eq!(
            store.phase().await,
            SessionPhase::Anonymous(AnonymousReason::Unauthorized)
        );

        let ok: Result<u8> = store.intercept(Ok(1)).await;
        assert_eq!(ok.unwrap(), 1);
        assert!(events.try_recv().is_err());
    }
}
