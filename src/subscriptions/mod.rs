//! Live fan-out of the record list.
//!
//! Every successful write publishes a full [`Snapshot`](crate::Snapshot) of
//! the table. A single dispatcher thread drains the relay and hands the
//! encoded snapshot to every registered subscriber:
//!
//! ```text
//!   handler ──publish()──► SnapshotSender ══ bounded, drop-oldest ══► Dispatcher thread
//!                                                                        │ retain()
//!                                               SubscriberRegistry ◄─────┘
//!                                                 │ try_send (per-connection outbox)
//!                                   ┌─────────────┼─────────────┐
//!                                   ▼             ▼             ▼
//!                              connection    connection    connection ──► WebSocket
//! ```
//!
//! Each outbox keeps the newest frames and overwrites the oldest, so a slow
//! connection skips stale snapshots but stays subscribed. A subscriber whose
//! outbox is closed is removed during the pass that found it, and is never
//! delivered to again.
//!
//! # Example
//!
//! ```ignore
//! let (broadcaster, dispatcher) = Broadcaster::start(&BroadcastConfig::default())?;
//!
//! let mut handle = broadcaster.subscribe();
//! broadcaster.publish(store.list()?);
//!
//! while let Some(frame) = handle.recv().await {
//!     socket.send(frame).await?;
//! }
//!
//! dispatcher.shutdown();
//! ```

mod channel;
mod dispatcher;
mod registry;
mod types;

use std::sync::Arc;

pub use channel::{snapshot_channel, PublishOutcome, SnapshotReceiver, SnapshotSender};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use registry::{Subscriber, SubscriberRegistry};
pub use types::{
    BroadcastConfig, DispatchStats, DispatchSummary, DropReason, Payload, SubscriberHandle,
    SubscriberId,
};

use crate::types::Record;

/// Producer-side entry point: owns the registry, the relay sender and the
/// shared counters. Clone it into every handler.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    sender: SnapshotSender,
    stats: Arc<DispatchStats>,
}

impl Broadcaster {
    /// Build the relay and registry and spawn the dispatcher thread.
    pub fn start(config: &BroadcastConfig) -> std::io::Result<(Self, DispatcherHandle)> {
        let registry = Arc::new(SubscriberRegistry::new(config.subscriber_buffer));
        let stats = Arc::new(DispatchStats::default());
        let (sender, receiver) = snapshot_channel(config.channel_capacity);

        let handle =
            Dispatcher::new(receiver, Arc::clone(&registry), Arc::clone(&stats)).spawn()?;

        tracing::info!(
            channel_capacity = sender.capacity(),
            subscriber_buffer = config.subscriber_buffer,
            "Broadcaster started"
        );

        Ok((
            Self {
                registry,
                sender,
                stats,
            },
            handle,
        ))
    }

    /// Queue the full record list for every subscriber. Never blocks.
    pub fn publish(&self, records: Vec<Record>) -> PublishOutcome {
        let count = records.len();
        let outcome = self.sender.publish(records);

        match outcome {
            PublishOutcome::Enqueued { sequence } => {
                self.stats.record_published(0);
                tracing::debug!(sequence = sequence, records = count, "Snapshot published");
            }
            PublishOutcome::Displaced {
                sequence,
                displaced,
            } => {
                self.stats.record_published(displaced);
                tracing::warn!(
                    sequence = sequence,
                    displaced = displaced,
                    "Fan-out falling behind, older snapshots evicted"
                );
            }
            PublishOutcome::Closed => {
                tracing::warn!(records = count, "Snapshot relay closed, publish skipped");
            }
        }

        outcome
    }

    /// Register a new live subscriber.
    pub fn subscribe(&self) -> SubscriberHandle {
        self.registry.subscribe()
    }

    /// Remove a subscriber (connection closed by the peer).
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.remove(id)
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Current dispatch counters.
    pub fn stats(&self) -> DispatchSummary {
        self.stats.summary()
    }
}
