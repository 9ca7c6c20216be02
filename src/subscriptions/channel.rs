//! Bounded snapshot relay between mutation handlers and the dispatcher.
//!
//! Publishing never blocks. When the buffer is full the oldest queued
//! snapshot is evicted to make room, so memory stays bounded no matter how
//! slow fan-out gets. A capacity of 1 degenerates to "latest only".

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{Record, Snapshot};

/// Result of [`SnapshotSender::publish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Queued without displacing anything.
    Enqueued { sequence: u64 },
    /// Queued after evicting `displaced` older snapshots.
    Displaced { sequence: u64, displaced: u64 },
    /// Relay disconnected; nothing was queued.
    Closed,
}

impl PublishOutcome {
    pub fn is_enqueued(&self) -> bool {
        !matches!(self, PublishOutcome::Closed)
    }
}

/// Producer half. Cheap to clone; every clone shares one sequence counter.
#[derive(Clone)]
pub struct SnapshotSender {
    tx: Sender<Snapshot>,
    /// Second handle on the queue, used only to evict the oldest entry.
    evict: Receiver<Snapshot>,
    next_sequence: Arc<AtomicU64>,
}

/// Consumer half, owned by the dispatcher.
pub struct SnapshotReceiver {
    rx: Receiver<Snapshot>,
}

/// Create a relay holding at most `capacity` snapshots (minimum 1).
pub fn snapshot_channel(capacity: usize) -> (SnapshotSender, SnapshotReceiver) {
    let (tx, rx) = bounded(capacity.max(1));

    let sender = SnapshotSender {
        tx,
        evict: rx.clone(),
        next_sequence: Arc::new(AtomicU64::new(1)),
    };

    (sender, SnapshotReceiver { rx })
}

impl SnapshotSender {
    /// Queue the full record list for fan-out.
    pub fn publish(&self, records: Vec<Record>) -> PublishOutcome {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let mut pending = Snapshot { sequence, records };
        let mut displaced = 0;

        loop {
            match self.tx.try_send(pending) {
                Ok(()) if displaced == 0 => return PublishOutcome::Enqueued { sequence },
                Ok(()) => return PublishOutcome::Displaced { sequence, displaced },
                Err(TrySendError::Full(snapshot)) => {
                    if let Ok(stale) = self.evict.try_recv() {
                        tracing::debug!(
                            evicted = stale.sequence,
                            sequence = sequence,
                            "Snapshot channel full, evicting oldest"
                        );
                        displaced += 1;
                    }
                    pending = snapshot;
                }
                Err(TrySendError::Disconnected(_)) => return PublishOutcome::Closed,
            }
        }
    }

    /// Snapshots currently queued.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    /// Maximum snapshots the relay holds.
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

impl SnapshotReceiver {
    /// Underlying receiver, for use in `select!`.
    pub(crate) fn inner(&self) -> &Receiver<Snapshot> {
        &self.rx
    }

    /// Take the next snapshot without blocking.
    pub fn try_recv(&self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }
}
