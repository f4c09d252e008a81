//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind with backlog, accept, classify errors)
//!     → event_loop.rs (accept gating, shutdown, closure reports)
//!     → connection.rs (registry, lifecycle tracking, exactly-once close)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Active → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - Accepts pause while `max_connections` are open; the kernel backlog absorbs the rest
//! - Each connection tracked for graceful shutdown
//! - A connection task reports its own end, whichever way it ends

pub mod connection;
pub mod event_loop;
pub mod listener;

pub use connection::{ConnectionId, ConnectionRegistry, ConnectionState, LoopReport};
pub use event_loop::{ConnectionHandler, EventLoop, LoopLimits, ServerError};
pub use listener::{Listener, ListenerError};
