//! Active health checking.
//!
//! # Responsibilities
//! - Run one probe task per backend
//! - Update backend liveness from each probe
//! - Stop all probe tasks on shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{Backend, BackendPool};

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: HealthCheckConfig) -> Self {
        Self { pool, config }
    }

    /// Spawn one probe loop per backend.
    ///
    /// Each loop exits once `shutdown` is triggered or dropped.
    pub fn spawn(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            path = %self.config.path,
            backends = self.pool.len(),
            "Health monitor starting"
        );

        let interval = self.config.interval();
        self.pool
            .backends()
            .iter()
            .map(|backend| {
                tokio::spawn(probe_loop(backend.clone(), interval, shutdown.subscribe()))
            })
            .collect()
    }
}

/// Probe `backend` every `interval`, starting one interval from now.
async fn probe_loop(backend: Arc<Backend>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                backend.probe().await;
            }
            _ = shutdown.recv() => {
                tracing::debug!(backend = %backend.address(), "Probe loop received shutdown signal, exiting");
                break;
            }
        }
    }
}
