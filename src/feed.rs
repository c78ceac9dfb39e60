use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{Mutex, broadcast::error::RecvError},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    api_objects::{DecisionReceipt, User},
    error::ClientError,
    store::{Action, Store, StoreEvent},
    task::Task,
    types::{Result, Verdict},
};

/// Candidates still to be decided, in server order.
///
/// Ids decided during this session are remembered and filtered out of every
/// later batch, so a decided candidate never comes back.
#[derive(Debug, Clone, Default)]
pub struct FeedQueue {
    candidates: VecDeque<User>,
    decided: HashSet<String>,
}

impl FeedQueue {
    /// Replaces the queue with `users`, minus decided and duplicate ids.
    pub fn replace(&mut self, users: Vec<User>) -> usize {
        let mut seen = HashSet::new();
        self.candidates = users
            .into_iter()
            .filter(|user| !self.decided.contains(&user.id) && seen.insert(user.id.clone()))
            .collect();
        self.candidates.len()
    }

    pub fn head(&self) -> Option<&User> {
        self.candidates.front()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.candidates.iter().any(|user| user.id == user_id)
    }

    /// Removes the candidate and marks it decided.
    pub fn remove(&mut self, user_id: &str) -> Option<User> {
        self.decided.insert(String::from(user_id));
        let position = self.candidates.iter().position(|user| user.id == user_id)?;
        self.candidates.remove(position)
    }

    pub fn is_decided(&self, user_id: &str) -> bool {
        self.decided.contains(user_id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn to_vec(&self) -> Vec<User> {
        self.candidates.iter().cloned().collect()
    }
}

/// The decision view: loads candidates and records one verdict at a time.
#[derive(Clone)]
pub struct FeedController {
    api: ApiClient,
    store: Store,
    queue: Arc<Mutex<FeedQueue>>,
    poll_interval: Duration,
}

impl FeedController {
    pub fn new(api: ApiClient, store: Store, poll_interval: Duration) -> Self {
        Self {
            api,
            store,
            queue: Arc::new(Mutex::new(FeedQueue::default())),
            poll_interval,
        }
    }

    /// Fetches candidates unless some are still queued. Failures are logged
    /// and leave the queue empty. Returns the queue length.
    pub async fn load(&self) -> usize {
        if !self.queue.lock().await.is_empty() {
            return self.len().await;
        }

        let users = match self.store.intercept(self.api.feed().await).await {
            Ok(users) => users,
            Err(error) => {
                warn!("Failed to load feed: {error}");
                return 0;
            }
        };

        let candidates = {
            let mut queue = self.queue.lock().await;
            queue.replace(users);
            queue.to_vec()
        };
        let loaded = candidates.len();

        debug!("Feed loaded with {loaded} candidates.");
        self.store.dispatch(Action::SetFeed(candidates)).await;
        loaded
    }

    pub async fn current(&self) -> Option<User> {
        self.queue.lock().await.head().cloned()
    }

    pub async fn candidates(&self) -> Vec<User> {
        self.queue.lock().await.to_vec()
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    /// Records `verdict` on a queued candidate with a single server call.
    ///
    /// The server enforces the daily limit. On success exactly that
    /// candidate leaves the queue; on failure the queue is untouched.
    pub async fn decide(&self, candidate_id: &str, verdict: Verdict) -> Result<DecisionReceipt> {
        if !self.queue.lock().await.contains(candidate_id) {
            return Err(ClientError::UnknownCandidate(String::from(candidate_id)));
        }

        let result = self
            .store
            .intercept(self.api.send_request(verdict, candidate_id).await)
            .await;

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(error @ ClientError::QuotaExceeded { .. }) => {
                info!("Decision limit reached: {error}");
                self.store.publish(StoreEvent::PremiumRequired);
                return Err(error);
            }
            Err(error) => return Err(error),
        };

        let exhausted = {
            let mut queue = self.queue.lock().await;
            queue.remove(candidate_id);
            queue.is_empty()
        };

        debug!("Marked {candidate_id} as {}.", verdict.as_str());
        self.store
            .dispatch(Action::RemoveFromFeed(String::from(candidate_id)))
            .await;
        self.store.publish(StoreEvent::CountsChanged);
        self.store.publish(StoreEvent::LimitsChanged {
            remaining: receipt.remaining,
        });
        if exhausted {
            self.store.publish(StoreEvent::FeedUpdated);
        }

        Ok(receipt)
    }

    /// Re-polls the feed every poll interval, and whenever the store reports
    /// `FeedUpdated`, while the queue is empty and a user is signed in.
    pub fn spawn_refresh(&self) -> Task<()> {
        let controller = self.clone();
        let mut events = self.store.subscribe();

        Task::spawn(async move {
            let mut interval = tokio::time::interval(controller.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    event = events.recv() => match event {
                        Ok(StoreEvent::FeedUpdated) => {}
                        Ok(_) | Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }

                if controller.store.phase().await.is_authenticated()
                    && controller.is_empty().await
                {
                    controller.load().await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: String::from(id),
            ..Default::default()
        }
    }

    fn ids(queue: &FeedQueue) -> Vec<String> {
        queue.to_vec().into_iter().map(|user| user.id).collect()
    }

    #[test]
    fn test_remove_takes_exactly_one() {
        let mut queue = FeedQueue::default();
        queue.replace(vec![user("a"), user("b"), user("c")]);

        assert_eq!(queue.remove("b").map(|user| user.id), Some(String::from("b")));
        assert_eq!(ids(&queue), vec!["a", "c"]);
        assert_eq!(queue.head().map(|user| user.id.as_str()), Some("a"));
    }

    #[test]
    fn test_decided_never_readded() {
        let mut queue = FeedQueue::default();
        queue.replace(vec![user("a"), user("b")]);
        queue.remove("a");

        let loaded = queue.replace(vec![user("a"), user("b"), user("b"), user("c")]);
        assert_eq!(loaded, 2);
        assert_eq!(ids(&queue), vec!["b", "c"]);
        assert!(queue.is_decided("a"));
        assert!(!queue.contains("a"));
    }

    #[test]
    fn test_remove_unknown_leaves_queue() {
        let mut queue = FeedQueue::default();
        queue.replace(vec![user("a")]);
        assert!(queue.remove("zzz").is_none());
        assert_eq!(queue.len(), 1);
    }
}
