//! Readiness-driven accept loop.
//!
//! # Event Sources
//! ```text
//! shutdown signal      → stop accepting, drain and close every connection
//! connection finished  → deregister it
//! listener readable    → accept, register, spawn the connection handler
//!                        (only while below max_connections)
//! ```
//!
//! The loop never runs request handling itself; each connection task
//! suspends on its own I/O and upstream calls, so one slow peer cannot
//! hold up accepts or other connections.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};

use crate::net::connection::{ConnectionRegistry, LoopReport};
use crate::net::listener::{Listener, ListenerError};

/// Serves one accepted connection until the peer leaves or `close` fires.
pub trait ConnectionHandler: Clone + Send + 'static {
    fn serve(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        close: oneshot::Receiver<()>,
    ) -> impl Future<Output = ()> + Send + 'static;
}

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Limits applied by the loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopLimits {
    pub max_connections: usize,
    pub shutdown_grace: Duration,
}

/// Owns the listening socket and every client connection.
pub struct EventLoop<H> {
    listener: Listener,
    registry: ConnectionRegistry,
    handler: H,
    shutdown_grace: Duration,
}

impl<H: ConnectionHandler> EventLoop<H> {
    pub fn new(listener: Listener, handler: H, limits: LoopLimits) -> Self {
        Self {
            listener,
            registry: ConnectionRegistry::new(limits.max_connections),
            handler,
            shutdown_grace: limits.shutdown_grace,
        }
    }

    /// Run until shutdown is signalled or the listener fails.
    ///
    /// Every connection is closed before this returns, in both cases.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<LoopReport, ServerError> {
        let outcome = loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, closing sockets");
                    break Ok(());
                }

                Some(id) = self.registry.next_closed() => {
                    self.registry.deregister(id);
                }

                accepted = self.listener.accept(), if self.registry.has_capacity() => {
                    match accepted {
                        Ok((stream, peer)) => self.dispatch(stream, peer),
                        Err(e) if e.is_transient() => {
                            tracing::warn!(error = %e, "Dropped pending connection");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Listener failed, shutting down");
                            break Err(ServerError::from(e));
                        }
                    }
                }
            }
        };

        let EventLoop {
            listener,
            mut registry,
            shutdown_grace,
            ..
        } = self;

        drop(listener);
        registry.close_all(shutdown_grace).await;

        let report = registry.report();
        tracing::info!(
            accepted = report.accepted,
            closed = report.closed,
            "Event loop stopped"
        );
        outcome.map(|()| report)
    }

    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let handler = self.handler.clone();
        self.registry
            .register(peer, move |close| handler.serve(stream, peer, close));
    }
}
