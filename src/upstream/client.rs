//! Upstream status API client.
//!
//! # Responsibilities
//! - Open a fresh TCP connection for every fetch (no pooling, no caching)
//! - Send a fixed `GET` with `Connection: close`
//! - Read exactly `Content-Length` bytes and parse the status document
//! - Bound every step with a deadline
//!
//! # Design Decisions
//! - One-shot connections trade a handshake per request for freshness
//! - Missing `Content-Length` is rejected before reading the body
//! - The fetch is a plain future, so other connections keep being served
//!   while it waits

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Method, Request};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::upstream::types::{StatusDocument, UpstreamError, UpstreamResult};

/// Client for the single upstream status document.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    /// `host:port` to connect to.
    addr: String,
    /// Value of the `Host` header.
    host_header: String,
    /// Path and query of the document.
    path: String,
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl UpstreamClient {
    /// Build a client from configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, url::ParseError> {
        let url = Url::parse(&config.url)?;
        let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
        let port = url.port_or_known_default().unwrap_or(80);

        let host_header = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(Self {
            addr: format!("{}:{}", host, port),
            host_header,
            path,
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// The `host:port` this client talks to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Fetch and parse the current status document.
    pub async fn fetch(&self) -> UpstreamResult<StatusDocument> {
        let started = Instant::now();

        let result = match timeout(self.request_timeout, self.round_trip()).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.request_timeout)),
        };

        match &result {
            Ok(doc) => {
                tracing::debug!(
                    upstream = %self.addr,
                    entities = doc.states.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upstream document fetched"
                );
                metrics::record_upstream_fetch("ok", started);
            }
            Err(e) => metrics::record_upstream_fetch(e.kind(), started),
        }

        result
    }

    async fn round_trip(&self) -> UpstreamResult<StatusDocument> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(UpstreamError::Connect {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(UpstreamError::ConnectTimeout {
                    addr: self.addr.clone(),
                    timeout: self.connect_timeout,
                })
            }
        };

        let (mut sender, connection) = http1::handshake::<_, Body>(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Upstream connection ended with error");
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(self.path.as_str())
            .header(header::HOST, self.host_header.as_str())
            .header(header::USER_AGENT, self.user_agent.as_str())
            .header(header::CONNECTION, "close")
            .body(Body::empty())?;

        let response = sender.send_request(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let declared = declared_length(response.headers())?;
        if declared > self.max_body_bytes as u64 {
            return Err(UpstreamError::BodyTooLarge {
                declared,
                limit: self.max_body_bytes,
            });
        }

        let body = axum::body::to_bytes(Body::new(response.into_body()), self.max_body_bytes)
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;

        if (body.len() as u64) < declared {
            return Err(UpstreamError::Truncated {
                declared,
                received: body.len(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

fn declared_length(headers: &header::HeaderMap) -> UpstreamResult<u64> {
    let value = headers
        .get(header::CONTENT_LENGTH)
        .ok_or(UpstreamError::MissingContentLength)?;

    let text = value
        .to_str()
        .map_err(|_| UpstreamError::InvalidContentLength(format!("{:?}", value)))?;

    text.trim()
        .parse()
        .map_err(|_| UpstreamError::InvalidContentLength(text.to_string()))
}
