//! Routing error taxonomy.
//!
//! # Design Decisions
//! - Probe failures never show up here; they only flip the liveness flag
//! - Upstream 4xx/5xx are successful proxy payloads, not errors
//! - Transport failures (including outbound timeouts) are the only
//!   errors that also mark the backend unhealthy

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced to the ingress layer for a single request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The pool was built without any backend.
    #[error("no backends configured")]
    EmptyPool,

    /// A full rotation found no healthy backend.
    #[error("all backends unhealthy")]
    AllBackendsUnhealthy,

    /// The outbound request could not be constructed.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    /// Connecting to or talking with the backend failed.
    #[error("backend {backend} unreachable: {source}")]
    Transport {
        backend: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// The backend did not answer within the proxy timeout.
    #[error("backend {backend} timed out after {after:?}")]
    Timeout { backend: String, after: Duration },

    /// The response head arrived but its body could not be read.
    #[error("failed reading body from {backend}: {source}")]
    Body {
        backend: String,
        #[source]
        source: axum::Error,
    },
}

impl ProxyError {
    /// True for failures that say something about the backend's liveness.
    pub fn is_transport(&self) -> bool {
        matches!(self, ProxyError::Transport { .. } | ProxyError::Timeout { .. })
    }

    /// Status code the ingress answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::EmptyPool | ProxyError::AllBackendsUnhealthy => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Transport { .. } | ProxyError::Body { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
