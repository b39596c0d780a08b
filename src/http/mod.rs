//! HTTP ingress subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → pool.next() picks a backend
//!     → backend.send() forwards (method, path, body)
//!     → 200 with the raw upstream body, or a mapped error status
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
