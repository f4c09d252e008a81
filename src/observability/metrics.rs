//! Metrics collection and exposition.
//!
//! # Metrics
//! - `aapi_requests_total` (counter): inbound requests by status
//! - `aapi_request_duration_seconds` (histogram): inbound latency
//! - `aapi_upstream_fetches_total` (counter): upstream fetches by outcome
//! - `aapi_upstream_fetch_duration_seconds` (histogram): upstream latency
//! - `aapi_connections_total` (counter): accepted client connections
//! - `aapi_active_connections` (gauge): currently registered connections
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, started: Instant) {
    ::metrics::counter!("aapi_requests_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("aapi_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_upstream_fetch(outcome: &'static str, started: Instant) {
    ::metrics::counter!("aapi_upstream_fetches_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("aapi_upstream_fetch_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_connection_accepted() {
    ::metrics::counter!("aapi_connections_total").increment(1);
}

pub fn set_active_connections(count: usize) {
    ::metrics::gauge!("aapi_active_connections").set(count as f64);
}
