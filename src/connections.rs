use tracing::{debug, warn};

use crate::{
    api::ApiClient,
    api_objects::{ConnectionRequest, MessageResponse, User},
    store::{Action, Store, StoreEvent},
    types::{Result, ReviewStatus},
};

/// Accepted connections and pending incoming requests.
#[derive(Clone)]
pub struct ConnectionService {
    api: ApiClient,
    store: Store,
}

impl ConnectionService {
    pub fn new(api: ApiClient, store: Store) -> Self {
        Self { api, store }
    }

    /// Failures are logged and leave the list empty.
    pub async fn load_connections(&self) -> Vec<User> {
        match self.store.intercept(self.api.connections().await).await {
            Ok(connections) => {
                self.store
                    .dispatch(Action::SetConnections(connections.clone()))
                    .await;
                connections
            }
            Err(error) => {
                warn!("Failed to load connections: {error}");
                vec![]
            }
        }
    }

    pub async fn load_requests(&self) -> Vec<ConnectionRequest> {
        match self.store.intercept(self.api.requests_received().await).await {
            Ok(requests) => {
                self.store
                    .dispatch(Action::SetRequests(requests.clone()))
                    .await;
                requests
            }
            Err(error) => {
                warn!("Failed to load requests: {error}");
                vec![]
            }
        }
    }

    /// Accepts or rejects an incoming request.
    pub async fn review(&self, request_id: &str, status: ReviewStatus) -> Result<MessageResponse> {
        let response = self
            .store
            .intercept(self.api.review_request(status, request_id).await)
            .await?;

        debug!("Request {request_id} {}.", status.as_str());
        self.store
            .dispatch(Action::RemoveRequest(String::from(request_id)))
            .await;
        self.store.publish(StoreEvent::CountsChanged);
        Ok(response)
    }

    /// Pending request and connection counts, as shown in the navigation bar.
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.store.snapshot().await;
        (state.requests.len(), state.connections.len())
    }
}
