//! Subscriber and broadcast types.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Encoded snapshot shared by every outbox (one allocation per broadcast).
///
/// Clones share the buffer, and the connection task sends it as a text
/// frame without copying.
pub type Payload = axum::extract::ws::Utf8Bytes;

/// Configuration for the broadcast path.
#[derive(Clone, Debug)]
pub struct BroadcastConfig {
    /// Snapshots buffered between producers and the dispatcher before the
    /// oldest is evicted. Clamped to at least 1 (latest-only).
    /// Default: 64
    pub channel_capacity: usize,

    /// Frames buffered per subscriber. When a connection falls further
    /// behind, its oldest frames are overwritten; it is never disconnected
    /// for being slow.
    /// Default: 32
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            subscriber_buffer: 32,
        }
    }
}

impl BroadcastConfig {
    /// Set the snapshot channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber outbox size.
    pub fn subscriber_buffer(mut self, size: usize) -> Self {
        self.subscriber_buffer = size.max(1);
        self
    }
}

/// Unique identifier for a subscriber. Never reused within a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a subscriber was removed by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Connection task already gone.
    Disconnected,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Receiving side of a subscription, owned by the connection task.
///
/// The outbox keeps the newest `subscriber_buffer` frames. A receiver that
/// falls further behind skips the overwritten frames and carries on from
/// the oldest one still held, so it always catches up to the latest
/// snapshot. `recv` yields `None` once the registry has let go of the
/// subscriber, which is the signal to close the connection.
pub struct SubscriberHandle {
    pub id: SubscriberId,
    receiver: broadcast::Receiver<Payload>,
    skipped: u64,
}

impl SubscriberHandle {
    pub(crate) fn new(id: SubscriberId, receiver: broadcast::Receiver<Payload>) -> Self {
        Self {
            id,
            receiver,
            skipped: 0,
        }
    }

    /// Receive the next snapshot.
    pub async fn recv(&mut self) -> Option<Payload> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(n)) => self.record_skip(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive a snapshot (non-blocking).
    pub fn try_recv(&mut self) -> Result<Payload, TryRecvError> {
        loop {
            match self.receiver.try_recv() {
                Err(TryRecvError::Lagged(n)) => self.record_skip(n),
                other => return other,
            }
        }
    }

    /// Blocking receive, for callers outside the async runtime.
    pub fn blocking_recv(&mut self) -> Option<Payload> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(n)) => self.record_skip(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Frames overwritten before this subscriber read them.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn record_skip(&mut self, n: u64) {
        self.skipped += n;
        tracing::debug!(
            subscriber = %self.id,
            skipped = n,
            "Subscriber behind, older frames overwritten"
        );
    }
}

/// Counters shared by producers and the dispatcher.
#[derive(Debug, Default)]
pub struct DispatchStats {
    published: AtomicU64,
    displaced: AtomicU64,
    dispatched: AtomicU64,
    deliveries: AtomicU64,
    dropped: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn record_published(&self, displaced: u64) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.displaced.fetch_add(displaced, Ordering::Relaxed);
    }

    pub(crate) fn record_pass(&self, deliveries: u64, dropped: u64) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(deliveries, Ordering::Relaxed);
        self.dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            snapshots_published: self.published.load(Ordering::Relaxed),
            snapshots_displaced: self.displaced.load(Ordering::Relaxed),
            snapshots_dispatched: self.dispatched.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            subscribers_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`DispatchStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Snapshots accepted by the channel.
    pub snapshots_published: u64,
    /// Queued snapshots evicted to make room for newer ones.
    pub snapshots_displaced: u64,
    /// Snapshots the dispatcher fanned out.
    pub snapshots_dispatched: u64,
    /// Successful hand-offs into subscriber outboxes.
    pub deliveries: u64,
    /// Subscribers removed after finding their connection gone.
    pub subscribers_dropped: u64,
}
