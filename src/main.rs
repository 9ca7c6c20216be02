//! namecast - name registry with live WebSocket updates
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (port 3300, ./names.db)
//! namecast
//!
//! # Serve the built frontend as well
//! namecast --static-dir frontend/dist
//!
//! # Port from the environment
//! PORT=8080 namecast --log-level debug
//! ```

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use namecast::api::DEFAULT_GREETING;
use namecast::config::DEFAULT_PORT;
use namecast::{BroadcastConfig, Server, ServerConfig};

/// namecast - name registry with live WebSocket updates
#[derive(Parser, Debug)]
#[command(name = "namecast")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "./names.db")]
    database: PathBuf,

    /// Directory of static files served for non-API paths
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Text returned by GET /api/message
    #[arg(long, default_value = DEFAULT_GREETING)]
    greeting: String,

    /// Snapshots buffered for the dispatcher before the oldest is evicted
    #[arg(long, default_value_t = 64)]
    channel_capacity: usize,

    /// Frames buffered per WebSocket before the oldest are overwritten
    #[arg(long, default_value_t = 32)]
    subscriber_buffer: usize,

    /// Log level (trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let config = ServerConfig::default()
            .bind((self.host, self.port).into())
            .database(&self.database)
            .greeting(&self.greeting)
            .broadcast(
                BroadcastConfig::default()
                    .channel_capacity(self.channel_capacity)
                    .subscriber_buffer(self.subscriber_buffer),
            );

        match &self.static_dir {
            Some(dir) => config.static_dir(dir),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let server = Server::new(cli.server_config()).context("failed to start server")?;

    server
        .run_until(wait_for_shutdown())
        .await
        .context("server error")?;

    Ok(())
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info")),
    }
    .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
