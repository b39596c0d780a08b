//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     One timer per backend
//!     → GET {backend}/health
//!     → 200 marks healthy, anything else unhealthy
//!
//! Passive marking (load_balancer/backend.rs):
//!     Transport failure while proxying
//!     → backend marked unhealthy until its next successful probe
//! ```
//!
//! # Design Decisions
//! - No thresholds: the last probe or failed send wins
//! - Health state is per-backend, not per-pool
//! - Probe tasks are owned by the server and cancelled on shutdown

pub mod active;

pub use active::HealthMonitor;
