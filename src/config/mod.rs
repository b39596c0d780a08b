//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, or a JSON array of addresses)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared with the pool, probes and HTTP server at startup
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup; no dynamic reconfiguration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    HealthCheckConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, RetryConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
