//! Response building and transformation.
//!
//! # Responsibilities
//! - Reshape the upstream document into the public JSON shape
//! - Translate entity names through the alias table
//! - Map upstream failures to gateway status codes
//! - Stamp content and connection reuse headers
//!
//! # Field Mapping
//! ```text
//! upstream enabled     → alert
//! upstream enabled_at  → start
//! upstream disabled_at → stop
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::aliases::AliasTable;
use crate::http::request::RequestTarget;
use crate::upstream::{EntityState, StatusDocument, Timestamp, UpstreamError};

/// `Content-Type` of every response body.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// The `Keep-Alive` header name (not among the `http` crate's constants).
pub static KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Public status of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityStatus {
    pub alert: bool,
    pub start: Option<Timestamp>,
    pub stop: Option<Timestamp>,
}

impl From<&EntityState> for EntityStatus {
    fn from(state: &EntityState) -> Self {
        Self {
            alert: state.enabled,
            start: state.enabled_at.clone(),
            stop: state.disabled_at.clone(),
        }
    }
}

/// A fully serialized response: status plus exact body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status, body },
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }

    /// `{"Error": message}` with the given status.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = format!(
            "{{\"Error\":{}}}",
            serde_json::Value::String(message.to_string())
        );
        Self {
            status,
            body: body.into_bytes(),
        }
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "Not found")
    }

    pub fn bad_request() -> Self {
        Self::error(StatusCode::BAD_REQUEST, "Bad request")
    }

    /// Gateway error for a failed upstream fetch.
    pub fn upstream_failure(err: &UpstreamError) -> Self {
        if err.is_timeout() {
            Self::error(StatusCode::GATEWAY_TIMEOUT, "Gateway timeout")
        } else {
            Self::error(StatusCode::BAD_GATEWAY, "Bad gateway")
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> axum::response::Response {
        let length = self.body.len();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        response
    }
}

/// Reshape the upstream document for the requested target.
pub fn build(target: &RequestTarget, doc: &StatusDocument, aliases: &AliasTable) -> ApiResponse {
    match target {
        RequestTarget::Root => {
            let listing: BTreeMap<&str, EntityStatus> = doc
                .states
                .iter()
                .map(|(canonical, state)| (aliases.public_name(canonical), EntityStatus::from(state)))
                .collect();
            ApiResponse::json(StatusCode::OK, &listing)
        }
        RequestTarget::Entity(name) => {
            let canonical = aliases.canonical_name(name);
            match doc.entity(canonical) {
                Some(state) => ApiResponse::json(StatusCode::OK, &EntityStatus::from(state)),
                None => ApiResponse::not_found(),
            }
        }
    }
}

/// Bounds advertised in `Keep-Alive` and enforced per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePolicy {
    pub idle_timeout: Duration,
    pub max_requests: u32,
}

impl KeepAlivePolicy {
    /// `timeout=<secs>, max=<requests>`
    pub fn header_value(&self) -> HeaderValue {
        let text = format!(
            "timeout={}, max={}",
            self.idle_timeout.as_secs(),
            self.max_requests
        );
        HeaderValue::from_str(&text).unwrap_or_else(|_| HeaderValue::from_static("timeout=5, max=10"))
    }

    /// Set connection reuse headers; `closing` marks the last response.
    pub fn apply(&self, headers: &mut HeaderMap, closing: bool) {
        if closing {
            headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
            headers.remove(&KEEP_ALIVE);
        } else {
            headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
            headers.insert(KEEP_ALIVE.clone(), self.header_value());
        }
    }
}
