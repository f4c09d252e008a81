//! Upstream status API subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → client.rs (fresh TCP connection, GET, Content-Length body)
//!     → types.rs (StatusDocument: canonical name → EntityState)
//!     → response builder
//! ```
//!
//! # Design Decisions
//! - Refetched on every inbound request; nothing is cached
//! - Every failure is request-scoped and maps to a gateway error

pub mod client;
pub mod types;

pub use client::UpstreamClient;
pub use types::{EntityState, StatusDocument, Timestamp, UpstreamError, UpstreamResult};
