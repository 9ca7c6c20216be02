//! Application state
//!
//! One `AppState` is built at startup and cloned into every handler. It owns
//! the store handle and the broadcaster; nothing is global.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::error::{ApiError, Result};
use crate::store::RecordStore;
use crate::subscriptions::Broadcaster;

/// Default `/api/message` greeting.
pub const DEFAULT_GREETING: &str = "Привет от сервера!";

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn RecordStore>,
    broadcaster: Broadcaster,
    greeting: Arc<str>,
    /// Held from a write until its snapshot is published, so snapshots are
    /// sequenced in the same order as the writes they reflect.
    write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, broadcaster: Broadcaster) -> Self {
        Self {
            store,
            broadcaster,
            greeting: Arc::from(DEFAULT_GREETING),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the `/api/message` greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Arc::from(greeting.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Run a read-only store call on the blocking pool.
    pub async fn read<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&dyn RecordStore) -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);

        tokio::task::spawn_blocking(move || op(store.as_ref()).map_err(ApiError::from))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?
    }

    /// Run one mutating store call, then read the table back and publish it.
    ///
    /// If `op` fails nothing is published. If the read-back fails the
    /// mutation still counts as successful and subscribers keep their last
    /// snapshot until the next write.
    ///
    /// Concurrent mutations run one at a time, so the last snapshot published
    /// always matches the table.
    pub async fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&dyn RecordStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let broadcaster = self.broadcaster.clone();
        let write_lock = Arc::clone(&self.write_lock);

        tokio::task::spawn_blocking(move || -> Result<T> {
            let _guard = write_lock.lock();
            let output = op(store.as_ref())?;

            match store.list() {
                Ok(records) => {
                    broadcaster.publish(records);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Read-back failed, skipping broadcast");
                }
            }

            Ok(output)
        })
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
    }
}
