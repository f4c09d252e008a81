//! Alert status API service.
//!
//! Republishes the upstream air-raid alert status document under public
//! region names.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────┐
//!                        │               ALERT API SERVICE            │
//!                        │                                            │
//!     Client Request     │  ┌──────────┐    ┌──────────┐              │
//!     ───────────────────┼─▶│   net    │───▶│   http   │              │
//!                        │  │event loop│    │  server  │              │
//!                        │  └──────────┘    └────┬─────┘              │
//!                        │                       │                    │
//!                        │                       ▼                    │
//!                        │                ┌──────────────┐            │     Upstream
//!                        │                │   upstream   │◀───────────┼──── status
//!                        │                │    client    │            │     JSON
//!                        │                └──────┬───────┘            │
//!                        │                       │                    │
//!                        │                       ▼                    │
//!     Client Response    │  ┌──────────┐    ┌──────────────┐          │
//!     ◀──────────────────┼──│ response │◀───│ alias table  │          │
//!                        │  │ builder  │    │              │          │
//!                        │  └──────────┘    └──────────────┘          │
//!                        │                                            │
//!                        │  config · lifecycle · observability        │
//!                        └────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use alert_api::config::{load_config, AppConfig};
use alert_api::lifecycle::signals::spawn_signal_handler;
use alert_api::lifecycle::{bootstrap, Shutdown};
use alert_api::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "alert-api")]
#[command(about = "Air-raid alert status API", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "alert-api starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        upstream = %config.upstream.url,
        "Configuration loaded"
    );

    let service = match bootstrap(config).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };
    tracing::info!(address = %service.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let report = service.run(shutdown_rx).await?;

    tracing::info!(
        accepted = report.accepted,
        closed = report.closed,
        "Shutdown complete"
    );
    Ok(())
}
