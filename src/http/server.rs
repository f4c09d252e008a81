//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the status handlers
//! - Wire up middleware (tracing, request timeout, request ID, Server header)
//! - Serve HTTP/1.1 on each accepted connection with bounded keep-alive
//! - Fetch upstream, reshape, respond

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::aliases::AliasTable;
use crate::config::AppConfig;
use crate::http::request::{RequestTarget, X_REQUEST_ID};
use crate::http::response::{self, ApiResponse, KeepAlivePolicy};
use crate::net::event_loop::ConnectionHandler;
use crate::observability::metrics;
use crate::upstream::UpstreamClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub aliases: Arc<AliasTable>,
    pub upstream: Arc<UpstreamClient>,
}

/// HTTP front end of the service; one clone serves each connection.
#[derive(Clone)]
pub struct HttpServer {
    router: Router,
    keep_alive: KeepAlivePolicy,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &AppConfig, aliases: Arc<AliasTable>, upstream: Arc<UpstreamClient>) -> Self {
        let state = AppState { aliases, upstream };
        let keep_alive = KeepAlivePolicy {
            idle_timeout: Duration::from_secs(config.http.keep_alive_timeout_secs),
            max_requests: config.http.keep_alive_max_requests,
        };

        Self {
            router: Self::build_router(config, state),
            keep_alive,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let server_name = HeaderValue::from_str(&config.http.server_name)
            .unwrap_or_else(|_| HeaderValue::from_static("AAPI/1.0"));

        Router::new()
            .route("/", get(status_handler).fallback(method_not_allowed))
            .route("/{*name}", get(status_handler).fallback(method_not_allowed))
            .with_state(state)
            .layer(SetResponseHeaderLayer::overriding(header::SERVER, server_name))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

impl ConnectionHandler for HttpServer {
    fn serve(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        mut close: oneshot::Receiver<()>,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        async move {
            let HttpServer { router, keep_alive } = self;
            let served = Arc::new(AtomicU32::new(0));

            let service = service_fn(move |request: Request<Incoming>| {
                let count = served.fetch_add(1, Ordering::Relaxed) + 1;
                let closing = count >= keep_alive.max_requests || wants_close(&request);
                let router = router.clone();

                async move {
                    let mut response = router.oneshot(request).await?;
                    keep_alive.apply(response.headers_mut(), closing);
                    Ok::<_, Infallible>(response)
                }
            });

            let mut builder = http1::Builder::new();
            builder
                .timer(TokioTimer::new())
                .header_read_timeout(keep_alive.idle_timeout)
                .keep_alive(true);

            let connection = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(connection);

            let result = tokio::select! {
                result = connection.as_mut() => result,
                _ = &mut close => {
                    connection.as_mut().graceful_shutdown();
                    connection.await
                }
            };

            match result {
                Ok(()) => tracing::debug!(peer_addr = %peer, "Peer finished"),
                Err(e) => tracing::debug!(peer_addr = %peer, error = %e, "Connection ended with error"),
            }
        }
    }
}

/// True when the client will not reuse the connection.
fn wants_close<B>(request: &Request<B>) -> bool {
    let connection = request
        .headers()
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase());

    match request.version() {
        Version::HTTP_10 => !matches!(connection.as_deref(), Some(v) if v.contains("keep-alive")),
        _ => matches!(connection.as_deref(), Some(v) if v.contains("close")),
    }
}

/// Status handler for `/` and `/<name>`.
/// Fetches the upstream document, then reshapes it for the target.
async fn status_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let target = match RequestTarget::from_path(uri.path()) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Undecodable request path");
            metrics::record_request(400, start_time);
            return ApiResponse::bad_request().into_response();
        }
    };

    tracing::info!(
        request_id = %request_id,
        method = %method,
        target = %target,
        "Request"
    );

    let api_response = match state.upstream.fetch().await {
        Ok(doc) => response::build(&target, &doc, &state.aliases),
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                upstream = %state.upstream.addr(),
                error = %e,
                "Upstream fetch failed"
            );
            ApiResponse::upstream_failure(&e)
        }
    };

    metrics::record_request(api_response.status.as_u16(), start_time);
    api_response.into_response()
}

/// Any method other than GET/HEAD; axum still adds the `Allow` header.
async fn method_not_allowed(method: Method) -> ApiResponse {
    tracing::debug!(method = %method, "Method not allowed");
    metrics::record_request(405, Instant::now());
    ApiResponse::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_detection() {
        let keep = Request::builder().body(()).unwrap();
        assert!(!wants_close(&keep));

        let close = Request::builder()
            .header(header::CONNECTION, "Close")
            .body(())
            .unwrap();
        assert!(wants_close(&close));

        let old = Request::builder().version(Version::HTTP_10).body(()).unwrap();
        assert!(wants_close(&old));

        let old_keep = Request::builder()
            .version(Version::HTTP_10)
            .header(header::CONNECTION, "keep-alive")
            .body(())
            .unwrap();
        assert!(!wants_close(&old_keep));
    }
}
