//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses are plain `host:port`
//! - Validate value ranges (intervals and timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("backend address '{0}' must be host:port without a scheme")]
    InvalidBackend(String),

    #[error("backend '{0}' listed more than once")]
    DuplicateBackend(String),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for address in &config.backends {
        if !is_host_port(address) {
            errors.push(ValidationError::InvalidBackend(address.clone()));
        } else if !seen.insert(address.as_str()) {
            errors.push(ValidationError::DuplicateBackend(address.clone()));
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.interval_secs"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.timeout_secs"));
    }
    if config.timeouts.proxy_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.proxy_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` that parses as the authority of an `http://` URL and
/// nothing else: no credentials, path, query or fragment.
fn is_host_port(address: &str) -> bool {
    if address.contains("://") {
        return false;
    }
    let has_port = address
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if !has_port {
        return false;
    }

    match Url::parse(&format!("http://{}", address)) {
        Ok(url) => {
            url.host_str().is_some_and(|host| !host.is_empty())
                && url.username().is_empty()
                && url.password().is_none()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}
