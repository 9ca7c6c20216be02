//! Fan-out dispatcher: the one long-lived consumer of the snapshot relay.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::channel::SnapshotReceiver;
use super::registry::SubscriberRegistry;
use super::types::{DispatchStats, Payload};
use crate::types::Snapshot;

/// Spawns the dispatcher thread.
pub struct Dispatcher {
    receiver: SnapshotReceiver,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<DispatchStats>,
}

/// Owner handle for a running dispatcher.
///
/// `shutdown` stops the loop and joins the thread. Dropping the handle
/// without calling it also stops the loop, but does not wait.
pub struct DispatcherHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(
        receiver: SnapshotReceiver,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            receiver,
            registry,
            stats,
        }
    }

    /// Start the loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<DispatcherHandle> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("namecast-fanout".to_string())
            .spawn(move || self.run(shutdown_rx))?;

        Ok(DispatcherHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    fn run(self, shutdown: Receiver<()>) {
        tracing::info!("Fan-out dispatcher started");

        loop {
            select! {
                recv(self.receiver.inner()) -> msg => match msg {
                    Ok(snapshot) => self.dispatch(&snapshot),
                    Err(_) => break,
                },
                // Fires when the handle sends or is dropped
                recv(shutdown) -> _ => break,
            }
        }

        tracing::info!("Fan-out dispatcher stopped");
    }

    /// Deliver one snapshot to every registered subscriber.
    pub(crate) fn dispatch(&self, snapshot: &Snapshot) {
        let payload: Payload = match snapshot.to_json() {
            Ok(json) => Payload::from(json),
            Err(e) => {
                tracing::error!(sequence = snapshot.sequence, error = %e, "Failed to encode snapshot");
                return;
            }
        };

        let mut delivered = 0u64;
        let dropped = self.registry.retain(|sub| {
            sub.try_deliver(&payload)?;
            delivered += 1;
            Ok(())
        });

        for (id, reason) in &dropped {
            tracing::warn!(
                subscriber = %id,
                reason = %reason,
                sequence = snapshot.sequence,
                "Dropping subscriber after failed delivery"
            );
        }

        self.stats.record_pass(delivered, dropped.len() as u64);

        tracing::debug!(
            sequence = snapshot.sequence,
            records = snapshot.len(),
            delivered = delivered,
            dropped = dropped.len(),
            "Snapshot dispatched"
        );
    }
}

impl DispatcherHandle {
    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Fan-out dispatcher panicked");
            }
        }
    }

    /// Whether the thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop(&mut self) {
        // Disconnecting wakes the select
        self.shutdown.take();
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
