//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! accepted TCP connection
//!     → server.rs (hyper HTTP/1.1 connection, Axum router, middleware)
//!     → request.rs (decode path into root or entity name)
//!     → [upstream client fetches the status document]
//!     → response.rs (alias translation, reshaping, headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestTarget, TargetError, X_REQUEST_ID};
pub use response::{ApiResponse, EntityStatus, KeepAlivePolicy};
pub use server::{AppState, HttpServer};
