//! Upstream document shape and error definitions.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Timestamps are passed through exactly as the upstream encodes them.
pub type Timestamp = serde_json::Value;

/// The upstream status document: `{"states": {<canonical>: {...}}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusDocument {
    pub states: BTreeMap<String, EntityState>,
}

impl StatusDocument {
    /// Look up one entity by canonical name.
    pub fn entity(&self, canonical: &str) -> Option<&EntityState> {
        self.states.get(canonical)
    }
}

/// Per-entity status as reported upstream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub enabled_at: Option<Timestamp>,
    #[serde(default)]
    pub disabled_at: Option<Timestamp>,
}

/// Errors that can occur while fetching the upstream document.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// TCP connection could not be established.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TCP connection was not established in time.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// HTTP protocol failure on the upstream connection.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// The outbound request could not be built.
    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),

    /// Upstream answered with a non-success status.
    #[error("upstream returned status {0}")]
    Status(StatusCode),

    #[error("upstream response has no Content-Length")]
    MissingContentLength,

    #[error("upstream Content-Length '{0}' is not a number")]
    InvalidContentLength(String),

    #[error("upstream body of {declared} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { declared: u64, limit: usize },

    #[error("failed to read upstream body: {0}")]
    Body(String),

    /// Connection closed before the declared body arrived.
    #[error("upstream body truncated: declared {declared} bytes, received {received}")]
    Truncated { declared: u64, received: usize },

    /// Body is not JSON, or lacks the `states` mapping.
    #[error("malformed upstream document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The whole round trip exceeded its deadline.
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ConnectTimeout { .. })
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::ConnectTimeout { .. } | Self::Timeout(_) => "timeout",
            Self::Http(_) | Self::Request(_) => "http",
            Self::Status(_) => "status",
            Self::MissingContentLength
            | Self::InvalidContentLength(_)
            | Self::BodyTooLarge { .. }
            | Self::Body(_)
            | Self::Truncated { .. } => "body",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;
