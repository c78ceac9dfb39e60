use std::{
    collections::HashSet,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, warn};

use crate::{
    protocol_objects::{InboundEvent, OutboundEvent, UserStatus},
    realtime::RealtimeHub,
    subscription::RealtimeSubscription,
    task::Task,
    types::{Result, Topic},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "Online",
            PresenceStatus::Offline => "Offline",
        }
    }

    pub fn color_class(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "bg-success",
            PresenceStatus::Offline => "bg-base-300",
        }
    }
}

/// Ids believed online. Eventually consistent: an id stays stale if its
/// offline event is lost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet {
    online: HashSet<String>,
}

impl PresenceSet {
    /// Returns `true` if the event was a presence event.
    pub fn apply(&mut self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::OnlineUsers(users) => {
                self.online = users.iter().cloned().collect();
            }
            InboundEvent::UserOnline(user_id) => {
                self.online.insert(user_id.clone());
            }
            InboundEvent::UserOffline(user_id) => {
                self.online.remove(user_id);
            }
            InboundEvent::MessageReceived(_) => return false,
        }
        true
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    pub fn status(&self, user_id: &str) -> PresenceStatus {
        if self.is_online(user_id) {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline
        }
    }

    pub fn status_color(&self, user_id: &str) -> &'static str {
        self.status(user_id).color_class()
    }

    pub fn status_label(&self, user_id: &str) -> &'static str {
        self.status(user_id).label()
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    pub fn online_users(&self) -> impl Iterator<Item = &str> {
        self.online.iter().map(String::as_str)
    }
}

/// Keeps a [`PresenceSet`] current from the shared realtime connection and
/// announces the local user's own status. Stops listening when the user
/// session ends; [`RealtimeHub::end_session`] announces the user offline.
pub struct PresenceTracker {
    hub: RealtimeHub,
    user_id: String,
    set: Arc<RwLock<PresenceSet>>,
    network_online: Arc<AtomicBool>,
    listener: Task<()>,
}

impl PresenceTracker {
    pub async fn start(hub: &RealtimeHub, user_id: &str) -> Result<Self> {
        let subscription = hub.subscribe(Topic::Presence).await?;
        subscription
            .emit(OutboundEvent::JoinUserStatus(UserStatus::new(user_id)))
            .await?;
        hub.register_presence(user_id);

        let set = Arc::new(RwLock::new(PresenceSet::default()));
        let listener = Task::spawn(Self::listen(subscription, Arc::clone(&set)));

        Ok(Self {
            hub: hub.clone(),
            user_id: String::from(user_id),
            set,
            network_online: Arc::new(AtomicBool::new(true)),
            listener,
        })
    }

    async fn listen(mut subscription: RealtimeSubscription, set: Arc<RwLock<PresenceSet>>) {
        while let Some(event) = subscription.recv().await {
            let mut guard = set.write().unwrap_or_else(PoisonError::into_inner);
            if guard.apply(&event) {
                debug!("Presence updated by {event}, {} online.", guard.len());
            }
        }
    }

    pub fn snapshot(&self) -> PresenceSet {
        self.set
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.set
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_online(user_id)
    }

    pub fn status(&self, user_id: &str) -> PresenceStatus {
        self.set
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status(user_id)
    }

    /// Whether the local machine believes it has network.
    pub fn is_network_online(&self) -> bool {
        self.network_online.load(Ordering::SeqCst)
    }

    /// Reports a local network change to the server. Failures are logged.
    pub async fn set_network_online(&self, online: bool) {
        self.network_online.store(online, Ordering::SeqCst);
        let status = UserStatus::new(&self.user_id);
        let event = if online {
            OutboundEvent::UserOnline(status)
        } else {
            OutboundEvent::UserOffline(status)
        };

        if let Err(error) = self.hub.emit(event).await {
            warn!("Failed to report network status: {error}");
        }
    }

    /// Announces offline and releases the subscription.
    pub async fn stop(self) {
        self.hub.unregister_presence(&self.user_id);
        if let Err(error) = self
            .hub
            .emit(OutboundEvent::UserOffline(UserStatus::new(&self.user_id)))
            .await
        {
            debug!("Could not announce offline status: {error}");
        }
        self.listener.cancel();
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol_objects::MessageReceived;

    fn id(value: &str) -> String {
        String::from(value)
    }

    #[test]
    fn test_snapshot_then_offline() {
        let mut set = PresenceSet::default();
        set.apply(&InboundEvent::OnlineUsers(vec![id("u1"), id("u2")]));
        set.apply(&InboundEvent::UserOffline(id("u1")));

        assert!(!set.is_online("u1"));
        assert!(set.is_online("u2"));
        assert_eq!(set.status_label("u2"), "Online");
        assert_eq!(set.status_color("u1"), "bg-base-300");
    }

    #[test]
    fn test_never_mentioned_is_offline() {
        let set = PresenceSet::default();
        assert!(!set.is_online("ghost"));
        assert_eq!(set.status("ghost"), PresenceStatus::Offline);
    }

    #[test]
    fn test_most_recent_mention_wins() {
        let mut set = PresenceSet::default();
        let events = [
            InboundEvent::UserOnline(id("a")),
            InboundEvent::UserOnline(id("a")),
            InboundEvent::UserOffline(id("b")),
            InboundEvent::OnlineUsers(vec![id("b")]),
            InboundEvent::UserOnline(id("c")),
            InboundEvent::UserOffline(id("c")),
        ];
        for event in &events {
            set.apply(event);
        }

        // The snapshot replaced the earlier "a online".
        assert!(!set.is_online("a"));
        assert!(set.is_online("b"));
        assert!(!set.is_online("c"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_offline_for_unknown_is_noop_and_chat_ignored() {
        let mut set = PresenceSet::default();
        assert!(set.apply(&InboundEvent::UserOffline(id("late"))));
        assert!(set.is_empty());

        let chat = InboundEvent::MessageReceived(MessageReceived {
            first_name: id("Ada"),
            last_name: id("L"),
            text: id("hi"),
            created_at: None,
        });
        assert!(!set.apply(&chat));
    }
}
