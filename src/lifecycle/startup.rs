//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order
//! - Start the optional metrics exporter
//! - Bind the listener last, so traffic only arrives when ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, except a missing alias file
//! - Subsystems initialize in order, not concurrently

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::aliases::AliasTable;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::net::{EventLoop, Listener, ListenerError, LoopLimits, LoopReport, ServerError};
use crate::observability::metrics;
use crate::upstream::UpstreamClient;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Config(Vec<ValidationError>),

    #[error("Invalid upstream URL: {0}")]
    UpstreamUrl(#[from] url::ParseError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// A bound, ready-to-run service.
pub struct Service {
    server: HttpServer,
    listener: Listener,
    limits: LoopLimits,
}

impl Service {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires or the listener fails.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<LoopReport, ServerError> {
        EventLoop::new(self.listener, self.server, self.limits)
            .run(shutdown)
            .await
    }
}

/// Bring up every subsystem and bind the listener.
pub async fn bootstrap(config: AppConfig) -> Result<Service, StartupError> {
    validate_config(&config).map_err(StartupError::Config)?;

    let aliases = Arc::new(AliasTable::load(Path::new(&config.aliases.path)));
    let upstream = Arc::new(UpstreamClient::from_config(&config.upstream)?);
    tracing::info!(upstream = %upstream.addr(), "Upstream configured");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(&config, aliases, upstream);
    let listener = Listener::bind(&config.listener).await?;

    let limits = LoopLimits {
        max_connections: config.listener.max_connections,
        shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
    };

    Ok(Service {
        server,
        listener,
        limits,
    })
}
