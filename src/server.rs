//! Server wiring
//!
//! Opens the store, starts the broadcaster, and serves the router until a
//! shutdown future resolves. The dispatcher thread is joined on the way out.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::{build_router, AppState};
use crate::config::ServerConfig;
use crate::error::StoreError;
use crate::store::Store;
use crate::subscriptions::{Broadcaster, DispatcherHandle};

/// Startup and serve failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// A configured, not yet listening server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
    dispatcher: DispatcherHandle,
}

impl Server {
    /// Open the store and start the fan-out dispatcher.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = Store::open_or_create(config.store.clone())?;

        tracing::info!(path = %config.store.path.display(), "Record store opened");

        let (broadcaster, dispatcher) = Broadcaster::start(&config.broadcast)?;
        let state =
            AppState::new(Arc::new(store), broadcaster).with_greeting(config.greeting.clone());

        Ok(Self {
            config,
            state,
            dispatcher,
        })
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Configured bind address.
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// API router plus request tracing and, if configured, static files.
    pub fn router(&self) -> Router {
        let router = build_router(self.state.clone());

        let router = match &self.config.static_dir {
            Some(dir) => router.fallback_service(ServeDir::new(dir)),
            None => router,
        };

        router.layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let app = self.router();

        tracing::info!(
            address = %addr,
            static_dir = ?self.config.static_dir,
            "Server is running on http://{}",
            addr
        );

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        tracing::info!("Shutting down fan-out dispatcher");
        let dispatcher = self.dispatcher;
        if let Err(e) = tokio::task::spawn_blocking(move || dispatcher.shutdown()).await {
            tracing::error!(error = %e, "Dispatcher shutdown task failed");
        }

        served?;
        Ok(())
    }
}
