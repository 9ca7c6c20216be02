//! # namecast
//!
//! A small name registry: clients save names over HTTP, the server keeps them
//! in a SQLite table, and every connected WebSocket subscriber receives the
//! full, updated list after each successful write.
//!
//! ## Core Concepts
//!
//! - **Records**: `{id, name, created_at}` rows, ids and timestamps assigned by the store
//! - **Snapshots**: the whole table, read back after every write
//! - **Broadcaster**: bounded relay plus one dispatcher thread fanning snapshots out
//! - **Subscribers**: WebSocket connections registered for pushes
//!
//! ## Example
//!
//! ```ignore
//! use namecast::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::default().port(3300).database("./names.db"))?;
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use api::{build_router, ApiError, AppState};
pub use config::ServerConfig;
pub use error::{Result, StoreError};
pub use server::{Server, ServerError};
pub use store::{RecordStore, Store, StoreConfig};
pub use subscriptions::{
    BroadcastConfig, Broadcaster, DispatchSummary, DispatcherHandle, DropReason, Payload,
    PublishOutcome, SubscriberHandle, SubscriberId, SubscriberRegistry,
};
pub use types::*;
