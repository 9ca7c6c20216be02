//! Registry of live subscribers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::broadcast;

use super::types::{DropReason, Payload, SubscriberHandle, SubscriberId};

/// Registry-side view of one connection.
///
/// Holds only the sending half of the connection's outbox; the socket stays
/// with the connection task.
pub struct Subscriber {
    id: SubscriberId,
    outbox: broadcast::Sender<Payload>,
    connected_at: Instant,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Hand a payload to the connection without waiting.
    ///
    /// A full outbox overwrites its oldest frame; only a connection that has
    /// dropped its receiving half fails.
    pub fn try_deliver(&self, payload: &Payload) -> Result<(), DropReason> {
        self.outbox
            .send(Payload::clone(payload))
            .map(|_| ())
            .map_err(|_| DropReason::Disconnected)
    }
}

/// Set of connected subscribers.
///
/// Every operation takes the same lock, so adds, removals and iteration
/// never interleave.
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    outbox_size: usize,
}

impl SubscriberRegistry {
    /// Create a registry whose subscribers buffer up to `outbox_size` frames.
    pub fn new(outbox_size: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            outbox_size: outbox_size.max(1),
        }
    }

    /// Register a new subscriber and return its receiving half.
    pub fn subscribe(&self) -> SubscriberHandle {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbox, receiver) = broadcast::channel(self.outbox_size);

        let subscriber = Subscriber {
            id,
            outbox,
            connected_at: Instant::now(),
        };

        let count = {
            let mut subs = self.subscribers.lock();
            subs.insert(id, subscriber);
            subs.len()
        };

        tracing::debug!(subscriber = %id, subscribers = count, "Subscriber added");

        SubscriberHandle::new(id, receiver)
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id);

        match removed {
            Some(sub) => {
                tracing::debug!(
                    subscriber = %id,
                    connected_for_ms = sub.connected_at.elapsed().as_millis() as u64,
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    /// Visit every subscriber under the lock.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Subscriber),
    {
        let subs = self.subscribers.lock();
        for sub in subs.values() {
            visit(sub);
        }
    }

    /// Visit every subscriber and remove the ones whose visit fails, in one
    /// critical section. Returns the removed ids with the failure reason.
    ///
    /// Dropping a removed subscriber closes its outbox, which ends the
    /// connection task's receive loop.
    pub fn retain<F>(&self, mut visit: F) -> Vec<(SubscriberId, DropReason)>
    where
        F: FnMut(&Subscriber) -> Result<(), DropReason>,
    {
        let mut dropped = Vec::new();
        let mut subs = self.subscribers.lock();

        subs.retain(|id, sub| match visit(sub) {
            Ok(()) => true,
            Err(reason) => {
                dropped.push((*id, reason));
                false
            }
        });

        dropped
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Whether `id` is still registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(super::BroadcastConfig::default().subscriber_buffer)
    }
}
