//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::api::DEFAULT_GREETING;
use crate::store::StoreConfig;
use crate::subscriptions::BroadcastConfig;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3300;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Record table location
    pub store: StoreConfig,

    /// Snapshot relay and subscriber outbox sizes
    pub broadcast: BroadcastConfig,

    /// Directory served for every non-API path (None = no static files)
    pub static_dir: Option<PathBuf>,

    /// Text returned by `GET /api/message`
    pub greeting: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            store: StoreConfig::default(),
            broadcast: BroadcastConfig::default(),
            static_dir: None,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set only the port
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the database file
    pub fn database(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    /// Serve static files from `dir`
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Set the greeting text
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Set the broadcast sizes
    pub fn broadcast(mut self, broadcast: BroadcastConfig) -> Self {
        self.broadcast = broadcast;
        self
    }
}
