//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files, and
//! every default reproduces the constants the service has always run with.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the alert API service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, backlog, limits).
    pub listener: ListenerConfig,

    /// Upstream status API settings.
    pub upstream: UpstreamConfig,

    /// Alias side file settings.
    pub aliases: AliasConfig,

    /// Response and keep-alive settings.
    pub http: HttpConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:19751").
    pub bind_address: String,

    /// Pending connection queue length passed to `listen(2)`.
    pub backlog: u32,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:19751".to_string(),
            backlog: 128,
            max_connections: 1024,
        }
    }
}

/// Upstream status API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Full URL of the upstream status document (plain `http` only).
    pub url: String,

    /// `User-Agent` sent with every upstream request.
    pub user_agent: String,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline for the whole upstream round trip in seconds.
    pub request_timeout_secs: u64,

    /// Largest upstream body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://jaam.net.ua/alerts_statuses_v1.json".to_string(),
            user_agent: "AAPI/1.0".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            max_body_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Alias table configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AliasConfig {
    /// Path to the JSON file of `[canonical, alias]` pairs.
    pub path: String,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            path: "aapi_names.json".to_string(),
        }
    }
}

/// Response header and connection reuse configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Value of the `Server` response header.
    pub server_name: String,

    /// Idle seconds before a kept-alive connection is closed.
    pub keep_alive_timeout_secs: u64,

    /// Requests served on one connection before it is closed.
    pub keep_alive_max_requests: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: "AAPI/1.0".to_string(),
            keep_alive_timeout_secs: 5,
            keep_alive_max_requests: 10,
        }
    }
}

/// Timeout configuration for the inbound side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// How long shutdown waits for connections to drain before aborting them.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_legacy_constants() {
        let config = AppConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:19751");
        assert_eq!(config.aliases.path, "aapi_names.json");
        assert_eq!(config.upstream.url, "http://jaam.net.ua/alerts_statuses_v1.json");
        assert_eq!(config.upstream.user_agent, "AAPI/1.0");
        assert_eq!(config.http.server_name, "AAPI/1.0");
        assert_eq!(config.http.keep_alive_timeout_secs, 5);
        assert_eq!(config.http.keep_alive_max_requests, 10);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [upstream]
            request_timeout_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.listener.backlog, 128);
        assert_eq!(config.upstream.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.upstream.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.aliases.path, "aapi_names.json");
    }
}
