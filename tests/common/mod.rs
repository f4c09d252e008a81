//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use alert_api::config::AppConfig;
use alert_api::lifecycle::{bootstrap, Shutdown};
use alert_api::net::{LoopReport, ServerError};

/// What the mock upstream sends back for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with a correct `Content-Length`.
    Json(String),
    /// Written verbatim, then the socket is closed.
    Raw(String),
    /// Reads the request and never answers.
    Stall,
    /// Like `Json`, after a pause.
    Delayed(Duration, String),
}

/// A mock upstream on an ephemeral port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}/alerts_statuses_v1.json", self.addr)
    }

    /// Requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a mock upstream that answers every request with `reply`.
pub async fn start_mock_upstream(reply: Reply) -> MockUpstream {
    start_programmable_upstream(move |_| reply.clone()).await
}

/// Start a mock upstream whose reply depends on the request index (0-based).
pub async fn start_programmable_upstream<F>(f: F) -> MockUpstream
where
    F: Fn(usize) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut socket = socket;
                        if read_request_head(&mut socket).await.is_none() {
                            return;
                        }
                        let index = counter.fetch_add(1, Ordering::SeqCst);
                        answer(socket, f(index)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, hits }
}

async fn answer(mut socket: TcpStream, reply: Reply) {
    let raw = match reply {
        Reply::Json(body) => json_response(&body),
        Reply::Raw(raw) => raw,
        Reply::Stall => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            return;
        }
        Reply::Delayed(delay, body) => {
            tokio::time::sleep(delay).await;
            json_response(&body)
        }
    };

    let _ = socket.write_all(raw.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn json_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Read until the end of the request head; `None` on early EOF.
pub async fn read_request_head(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    Some(head)
}

/// Upstream document with one entity per `(name, enabled)` pair.
pub fn status_document(entities: &[(&str, bool)]) -> String {
    let states: serde_json::Map<String, serde_json::Value> = entities
        .iter()
        .map(|(name, enabled)| {
            let state = if *enabled {
                serde_json::json!({"enabled": true, "enabled_at": "2022-05-01T10:00:00Z", "disabled_at": null})
            } else {
                serde_json::json!({"enabled": false, "enabled_at": null, "disabled_at": "2022-05-01T11:00:00Z"})
            };
            (name.to_string(), state)
        })
        .collect();

    serde_json::json!({ "states": states }).to_string()
}

/// Write an alias file to a unique temp path.
pub fn write_alias_file(pairs: &[(&str, &str)]) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let path = std::env::temp_dir().join(format!(
        "aapi-names-{}-{}.json",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    let json = serde_json::to_string(
        &pairs
            .iter()
            .map(|(canonical, public)| [*canonical, *public])
            .collect::<Vec<_>>(),
    )
    .unwrap();
    std::fs::write(&path, json).unwrap();
    path
}

/// Config for a service on an ephemeral port backed by `upstream_url`.
pub fn test_config(upstream_url: &str, alias_path: Option<PathBuf>) -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.url = upstream_url.to_string();
    config.upstream.connect_timeout_secs = 1;
    config.upstream.request_timeout_secs = 1;
    config.aliases.path = alias_path
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/nonexistent/aapi_names.json".into());
    config.timeouts.shutdown_grace_secs = 1;
    config
}

/// A running service.
pub struct TestService {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<LoopReport, ServerError>>,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the loop's report.
    pub async fn stop(self) -> LoopReport {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("service did not stop")
            .unwrap()
            .unwrap()
    }
}

pub async fn spawn_service(config: AppConfig) -> TestService {
    let service = bootstrap(config).await.unwrap();
    let addr = service.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(service.run(shutdown.subscribe()));

    TestService {
        addr,
        shutdown,
        handle,
    }
}

/// Client that opens a fresh connection per request.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A response read straight off the socket.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// First value of a header; names compare case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Read one `Content-Length` framed response; `None` on EOF before a full head.
pub async fn read_response(stream: &mut TcpStream) -> Option<RawResponse> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let status = lines.next()?.split_whitespace().nth(1)?.parse().ok()?;
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    let mut body = data[head_end..].to_vec();
    while body.len() < length {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&buf[..n]),
        }
    }
    body.truncate(length);

    Some(RawResponse {
        status,
        headers,
        body,
    })
}

/// Send a bare `GET` over an open connection and read the answer.
pub async fn raw_get(stream: &mut TcpStream, path: &str) -> RawResponse {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    stream.write_all(request.as_bytes()).await.unwrap();
    read_response(stream).await.expect("no response")
}

/// True once the peer has closed the connection.
pub async fn is_closed(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 16];
    matches!(
        tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}
