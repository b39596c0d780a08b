//! Round-robin reverse-proxy load balancer.
//!
//! Inbound requests are forwarded to the next healthy backend in a fixed
//! rotation. Every backend is probed on its own timer and failed sends mark
//! a backend unhealthy until its next successful probe.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Backend, BackendPool};
