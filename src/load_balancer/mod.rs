//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (fixed, ordered set of backends)
//!     → round_robin.rs (rotate, skipping unhealthy backends)
//!     → backend.rs (send the request, return the raw body)
//!     → Return body bytes or a routing error
//! ```
//!
//! # Design Decisions
//! - Backends own their liveness flag; the selector only reads it
//! - Selection is lock-free; a pick may race with a probe flipping the flag
//! - Unhealthy backends excluded from selection unless none are healthy,
//!   in which case selection fails

use std::sync::Arc;

use crate::error::ProxyError;

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendSettings, UpstreamClient};
pub use pool::{BackendPool, PoolError};
pub use round_robin::RoundRobin;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick the backend for the next request.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, ProxyError>;
}
