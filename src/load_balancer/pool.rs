//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed, ordered set of backends
//! - Apply the load balancing algorithm to select a backend
//! - Expose the backends to the health probe tasks

use std::sync::Arc;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::load_balancer::{
    backend::{build_client, Backend, BackendSettings, UpstreamClient},
    round_robin::RoundRobin,
    LoadBalancer,
};

/// Error type for pool construction.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid backend address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },
}

/// The ordered set of backends and the selector rotating over them.
///
/// Insertion order is selection order and never changes.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    balancer: Box<dyn LoadBalancer>,
}

impl BackendPool {
    /// Create a round-robin pool over `addresses`.
    pub fn new(
        addresses: &[String],
        client: UpstreamClient,
        settings: BackendSettings,
    ) -> Result<Self, PoolError> {
        let backends = addresses
            .iter()
            .map(|address| {
                Backend::new(address, client.clone(), settings.clone())
                    .map(Arc::new)
                    .map_err(|source| PoolError::InvalidAddress {
                        address: address.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::with_balancer(backends, Box::new(RoundRobin::new())))
    }

    /// Create a pool from the backend list and timeouts in `config`.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, PoolError> {
        let client = build_client(config.timeouts.proxy());
        Self::new(&config.backends, client, BackendSettings::from(config))
    }

    /// Create a pool with an explicit selection strategy.
    pub fn with_balancer(backends: Vec<Arc<Backend>>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self { backends, balancer }
    }

    /// Select the backend for the next request.
    pub fn next(&self) -> Result<Arc<Backend>, ProxyError> {
        let result = self.balancer.next_server(&self.backends);
        if let Err(e) = &result {
            tracing::debug!(backend_count = self.backends.len(), error = %e, "No backend selected");
            for b in &self.backends {
                tracing::debug!(backend = %b.address(), healthy = b.is_healthy(), "Backend status");
            }
        }
        result
    }

    /// All backends, in pool order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Number of backends currently flagged healthy.
    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_healthy()).count()
    }
}
