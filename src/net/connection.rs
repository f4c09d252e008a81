//! Connection registry and lifecycle tracking.
//!
//! # Responsibilities
//! - Track every open client connection (Active → Draining → Closed)
//! - Generate unique connection IDs for tracing
//! - Report each closure exactly once, even on panic or abort
//! - Coordinate shutdown per-connection

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is registered and serving requests.
    Active,
    /// Connection was asked to close after its in-flight request.
    Draining,
    /// Connection is closed.
    Closed,
}

/// Guard owned by a connection task.
/// Reports the closure to the registry when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
    closed_tx: mpsc::UnboundedSender<ConnectionId>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        // The registry outlives its tasks unless the whole loop is gone.
        let _ = self.closed_tx.send(self.id);
    }
}

#[derive(Debug)]
struct ConnectionEntry {
    peer: SocketAddr,
    state: ConnectionState,
    close_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ConnectionEntry {
    fn begin_draining(&mut self) {
        if self.state == ConnectionState::Active {
            self.state = ConnectionState::Draining;
        }
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Accept/close accounting returned when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub accepted: u64,
    pub closed: u64,
}

/// Tracks every open client connection and the task serving it.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    closed_tx: mpsc::UnboundedSender<ConnectionId>,
    closed_rx: mpsc::UnboundedReceiver<ConnectionId>,
    max_connections: usize,
    report: LoopReport,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        Self {
            connections: HashMap::new(),
            closed_tx,
            closed_rx,
            max_connections,
            report: LoopReport::default(),
        }
    }

    /// Spawn the task serving a connection and start tracking it.
    ///
    /// `serve` receives the close signal the registry fires on shutdown.
    pub fn register<F, Fut>(&mut self, peer: SocketAddr, serve: F) -> ConnectionId
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = ConnectionId::new();
        let (close_tx, close_rx) = oneshot::channel();
        let guard = ConnectionGuard {
            id,
            closed_tx: self.closed_tx.clone(),
        };

        let span = tracing::info_span!("connection", id = %id, peer = %peer);
        let connection = serve(close_rx);
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                connection.await;
            }
            .instrument(span),
        );

        self.connections.insert(
            id,
            ConnectionEntry {
                peer,
                state: ConnectionState::Active,
                close_tx: Some(close_tx),
                task,
            },
        );
        self.report.accepted += 1;
        metrics::record_connection_accepted();
        metrics::set_active_connections(self.connections.len());
        tracing::debug!(connection_id = %id, peer_addr = %peer, "Connection registered");

        id
    }

    /// Wait for the next connection task to finish.
    pub async fn next_closed(&mut self) -> Option<ConnectionId> {
        self.closed_rx.recv().await
    }

    /// Forget a finished connection. Returns false if it was not registered.
    pub fn deregister(&mut self, id: ConnectionId) -> bool {
        let Some(entry) = self.connections.remove(&id) else {
            tracing::warn!(connection_id = %id, "Close reported for unknown connection");
            return false;
        };

        self.report.closed += 1;
        metrics::set_active_connections(self.connections.len());
        tracing::debug!(connection_id = %id, peer_addr = %entry.peer, "Connection closed");
        true
    }

    /// Signal every connection to close, wait for them, then abort stragglers.
    pub async fn close_all(&mut self, grace: Duration) {
        if self.connections.is_empty() {
            return;
        }

        tracing::info!(open = self.connections.len(), "Closing client connections");
        for entry in self.connections.values_mut() {
            entry.begin_draining();
        }

        let deadline = Instant::now() + grace;
        let mut aborted = false;

        while !self.connections.is_empty() {
            let next = if aborted {
                self.closed_rx.recv().await
            } else {
                match tokio::time::timeout_at(deadline, self.closed_rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            remaining = self.connections.len(),
                            "Grace period elapsed, aborting connections"
                        );
                        for entry in self.connections.values() {
                            entry.task.abort();
                        }
                        aborted = true;
                        continue;
                    }
                }
            };

            match next {
                Some(id) => {
                    self.deregister(id);
                }
                // Unreachable while the registry holds a sender.
                None => break,
            }
        }
    }

    /// Unknown IDs are reported as closed.
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.connections
            .get(&id)
            .map_or(ConnectionState::Closed, |entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether another connection may be accepted.
    pub fn has_capacity(&self) -> bool {
        self.connections.len() < self.max_connections
    }

    pub fn report(&self) -> LoopReport {
        self.report
    }
}
