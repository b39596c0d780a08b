//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Forward one proxied request and return the raw response body
//! - Run a single liveness probe against `/health`
//! - Track liveness (Healthy/Unhealthy) in an atomic flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use bytes::Bytes;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::observability::metrics;

/// HTTP client shared by every backend in a pool.
pub type UpstreamClient = Client<HttpConnector, Body>;

const PROBE_USER_AGENT: &str = "rotary-proxy-health-check";

/// Build the outbound client with a bounded connect phase.
pub fn build_client(connect_timeout: Duration) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Per-backend call settings derived from configuration.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Deadline for one proxied exchange (head and body).
    pub proxy_timeout: Duration,
    /// Deadline for one health probe.
    pub probe_timeout: Duration,
    /// Path probed for liveness.
    pub probe_path: String,
}

impl From<&ProxyConfig> for BackendSettings {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            proxy_timeout: config.timeouts.proxy(),
            probe_timeout: config.health_check.timeout(),
            probe_path: config.health_check.path.clone(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self::from(&ProxyConfig::default())
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// The `host:port` the backend was configured with.
    address: String,
    /// `http://host:port`, without a trailing slash.
    origin: String,
    /// Liveness flag, written by the probe task and by failed sends.
    healthy: AtomicBool,
    client: UpstreamClient,
    settings: BackendSettings,
}

impl Backend {
    /// Create a new backend. Backends start out healthy.
    pub fn new(
        address: &str,
        client: UpstreamClient,
        settings: BackendSettings,
    ) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&format!("http://{}", address))?;
        Ok(Self {
            address: address.to_string(),
            origin: base_url.origin().ascii_serialization(),
            healthy: AtomicBool::new(true),
            client,
            settings,
        })
    }

    /// The configured `host:port`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The base URI requests are sent to.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    // --- Health Logic ---

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Store a new liveness value. Returns true if the value changed.
    ///
    /// Every write is mirrored to the `proxy_backend_health` gauge.
    pub fn set_healthy(&self, healthy: bool) -> bool {
        let previous = self.healthy.swap(healthy, Ordering::AcqRel);
        metrics::record_backend_health(&self.address, healthy);
        if previous != healthy {
            if healthy {
                tracing::info!(backend = %self.address, "Backend marked healthy");
            } else {
                tracing::warn!(backend = %self.address, "Backend marked unhealthy");
            }
        }
        previous != healthy
    }

    pub fn mark_unhealthy(&self) {
        self.set_healthy(false);
    }

    /// Issue one `GET {origin}{probe_path}` and record the outcome.
    ///
    /// Only a `200 OK` counts as healthy.
    pub async fn probe(&self) -> bool {
        let uri = format!("{}{}", self.origin, self.settings.probe_path);
        let request = match Request::builder()
            .method(Method::GET)
            .uri(uri.as_str())
            .header(header::USER_AGENT, PROBE_USER_AGENT)
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %self.address, error = %e, "Failed to build health check request");
                self.set_healthy(false);
                return false;
            }
        };

        let healthy = match tokio::time::timeout(
            self.settings.probe_timeout,
            self.client.request(request),
        )
        .await
        {
            Ok(Ok(response)) if response.status() == StatusCode::OK => true,
            Ok(Ok(response)) => {
                tracing::warn!(backend = %self.address, status = %response.status(), "Health check failed: non-200 status");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %self.address, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(backend = %self.address, "Health check failed: timeout");
                false
            }
        };

        self.set_healthy(healthy);
        healthy
    }

    /// Forward one request and return the upstream body verbatim.
    ///
    /// The upstream status code is not inspected. Transport failures and
    /// timeouts mark the backend unhealthy before returning.
    pub async fn send(&self, method: Method, path: &str, body: Bytes) -> Result<Bytes, ProxyError> {
        self.send_with_headers(method, path, HeaderMap::new(), body).await
    }

    /// Like [`Backend::send`], forwarding the given headers as well.
    pub async fn send_with_headers(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Bytes, ProxyError> {
        let uri = format!("{}{}", self.origin, path);
        let mut builder = Request::builder().method(method).uri(uri.as_str());
        if let Some(target) = builder.headers_mut() {
            target.extend(headers);
        }
        let request = builder.body(Body::from(body)).map_err(|e| {
            tracing::error!(backend = %self.address, uri = %uri, error = %e, "Failed to build upstream request");
            ProxyError::InvalidRequest(e.to_string())
        })?;

        let exchange = async {
            let response = self.client.request(request).await.map_err(|e| {
                ProxyError::Transport {
                    backend: self.address.clone(),
                    source: e,
                }
            })?;
            tracing::debug!(backend = %self.address, status = %response.status(), "Upstream responded");

            axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
                .await
                .map_err(|e| ProxyError::Body {
                    backend: self.address.clone(),
                    source: e,
                })
        };

        let result = match tokio::time::timeout(self.settings.proxy_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Timeout {
                backend: self.address.clone(),
                after: self.settings.proxy_timeout,
            }),
        };

        if let Err(e) = &result {
            tracing::warn!(backend = %self.address, error = %e, "Upstream request failed");
            if e.is_transport() {
                self.mark_unhealthy();
            }
        }
        result
    }
}
