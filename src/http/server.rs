//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Spawn and stop the per-backend probe tasks
//! - Forward requests to the backend picked by the pool

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ProxyConfig, RetryConfig};
use crate::health::HealthMonitor;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendPool, PoolError};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<BackendPool>,
    pub retry: RetryConfig,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<BackendPool>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, PoolError> {
        let pool = Arc::new(BackendPool::from_config(&config)?);
        Ok(Self::with_pool(config, pool))
    }

    /// Create a server around an existing pool.
    pub fn with_pool(config: ProxyConfig, pool: Arc<BackendPool>) -> Self {
        let state = AppState {
            pool: pool.clone(),
            retry: config.retry.clone(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
                    .layer(TimeoutLayer::new(config.timeouts.request()))
                    .layer(DefaultBodyLimit::disable()),
            )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Probe tasks start before the first connection is accepted and are
    /// stopped after in-flight requests drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            "HTTP server starting"
        );

        let monitor = HealthMonitor::new(self.pool.clone(), self.config.health_check.clone());
        let probes = monitor.spawn(&shutdown);

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(Shutdown::wait(shutdown.subscribe()))
            .await;

        shutdown.trigger();
        for probe in probes {
            let _ = probe.await;
        }

        tracing::info!("HTTP server stopped");
        result
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Get a reference to the backend pool.
    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }
}

/// Main proxy handler.
/// Selects a backend, forwards the request, and answers with the raw body.
async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers).to_string();
    let method_str = method.to_string();
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    let max_attempts = if state.retry.enabled { 2 } else { 1 };
    let mut attempts = 0;

    loop {
        attempts += 1;

        let backend = match state.pool.next() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "No backend available");
                metrics::record_request(&method_str, e.status_code().as_u16(), "none", start_time);
                return e.into_response();
            }
        };

        let mut forward = HeaderMap::new();
        if let Some(id) = headers.get(&X_REQUEST_ID) {
            forward.insert(X_REQUEST_ID, id.clone());
        }

        match backend
            .send_with_headers(method.clone(), &path, forward, body.clone())
            .await
        {
            Ok(payload) => {
                metrics::record_request(&method_str, 200, backend.address(), start_time);
                return (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    payload,
                )
                    .into_response();
            }
            Err(e) if e.is_transport() && attempts < max_attempts => {
                tracing::info!(
                    request_id = %request_id,
                    attempt = attempts,
                    backend = %backend.address(),
                    error = %e,
                    "Retrying on next backend"
                );
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, attempt = attempts, error = %e, "Upstream error");
                metrics::record_request(
                    &method_str,
                    e.status_code().as_u16(),
                    backend.address(),
                    start_time,
                );
                return e.into_response();
            }
        }
    }
}
