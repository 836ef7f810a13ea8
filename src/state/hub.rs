use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state::session::GameSession;

/// Snapshot pushed to subscribers after every committed write.
pub type SessionUpdate = Arc<GameSession>;

/// Per-session broadcast channels used for real-time subscriptions.
pub struct SessionHubs {
    capacity: usize,
    channels: DashMap<Uuid, broadcast::Sender<SessionUpdate>>,
}

impl SessionHubs {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: DashMap::new(),
        }
    }

    /// Register a subscriber for `session_id`, creating the channel on first use.
    pub fn subscribe(&self, session_id: Uuid) -> broadcast::Receiver<SessionUpdate> {
        self.channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Push `session` to its subscribers. Channels nobody listens to are dropped.
    pub fn publish(&self, session: &GameSession) {
        let id = session.id;
        let delivered = match self.channels.get(&id) {
            Some(sender) => sender.send(Arc::new(session.clone())).is_ok(),
            None => return,
        };

        if !delivered {
            self.release(id);
        }
    }

    /// Drop the channel of `session_id` once its last receiver is gone.
    pub fn release(&self, session_id: Uuid) {
        self.channels
            .remove_if(&session_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Close the channel of a deleted session; subscribers observe the end of the stream.
    pub fn remove(&self, session_id: Uuid) {
        self.channels.remove(&session_id);
    }

    pub fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.channels
            .get(&session_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
