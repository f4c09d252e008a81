//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the upstream URL
//! - Validate value ranges (timeouts > 0, bounds > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.url: {0}")]
    InvalidUpstreamUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("timeouts.request_secs ({request_secs}) must exceed upstream.request_timeout_secs ({upstream_secs})")]
    TimeoutOrder { request_secs: u64, upstream_secs: u64 },
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Err(reason) = check_upstream_url(&config.upstream.url) {
        errors.push(ValidationError::InvalidUpstreamUrl(reason));
    }

    let non_zero: [(&'static str, u64); 8] = [
        ("listener.backlog", config.listener.backlog.into()),
        ("listener.max_connections", config.listener.max_connections as u64),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.request_timeout_secs", config.upstream.request_timeout_secs),
        ("upstream.max_body_bytes", config.upstream.max_body_bytes as u64),
        ("http.keep_alive_timeout_secs", config.http.keep_alive_timeout_secs),
        ("http.keep_alive_max_requests", config.http.keep_alive_max_requests.into()),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    errors.extend(
        non_zero
            .iter()
            .filter(|(_, value)| *value == 0)
            .map(|(field, _)| ValidationError::Zero(*field)),
    );

    // The upstream deadline must fire first so a stall still answers with JSON.
    let request_secs = config.timeouts.request_secs;
    let upstream_secs = config.upstream.request_timeout_secs;
    if request_secs != 0 && request_secs <= upstream_secs {
        errors.push(ValidationError::TimeoutOrder {
            request_secs,
            upstream_secs,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' does not parse: {}", raw, e))?;
    if url.scheme() != "http" {
        return Err(format!("scheme '{}' is not supported, use http", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    Ok(())
}
