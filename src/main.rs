//! Rotary Proxy
//!
//! A round-robin reverse proxy built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────┐
//!                     │                ROTARY PROXY                │
//!   Client Request    │  ┌─────────┐    ┌──────────────┐           │
//!   ──────────────────┼─▶│  http   │───▶│ BackendPool  │           │
//!                     │  │ server  │    │ (round robin)│           │
//!                     │  └─────────┘    └──────┬───────┘           │
//!                     │                        ▼                   │
//!   Client Response   │  ┌─────────┐    ┌──────────────┐           │
//!   ◀─────────────────┼──│  200 +  │◀───│   Backend    │◀──────────┼──── Backend
//!                     │  │raw body │    │    send()    │           │     Server
//!                     │  └─────────┘    └──────────────┘           │
//!                     │                        ▲                   │
//!                     │                 ┌──────┴───────┐           │
//!                     │                 │  probe task  │ 1/backend │
//!                     │                 └──────────────┘           │
//!                     └────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rotary_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use rotary_proxy::lifecycle::{signals, Shutdown};
use rotary_proxy::observability::{logging, metrics};
use rotary_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "rotary-proxy")]
#[command(about = "Round-robin reverse proxy with active health checks", long_about = None)]
struct Args {
    /// Config file (TOML, or a JSON array of backend addresses).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file.
    #[arg(short, long)]
    bind: Option<String>,

    /// Backend `host:port`; repeatable, replaces the configured list.
    #[arg(long = "backend")]
    backends: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if !args.backends.is_empty() {
        config.backends = args.backends;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("rotary-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends,
        probe_interval_secs = config.health_check.interval_secs,
        proxy_timeout_secs = config.timeouts.proxy_secs,
        retry = config.retry.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signal_task = signals::install(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
