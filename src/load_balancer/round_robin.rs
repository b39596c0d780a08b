//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::ProxyError;
use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector that skips unhealthy backends.
///
/// The cursor names the next candidate. Picking a backend and advancing
/// the cursor one past it happen in a single compare-exchange, so the
/// cursor always stays in `[0, len)`.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, ProxyError> {
        let len = backends.len();
        if len == 0 {
            return Err(ProxyError::EmptyPool);
        }

        let mut current = self.cursor.load(Ordering::Acquire);
        loop {
            let start = current % len;

            // At most one full cycle.
            let index = (0..len)
                .map(|step| (start + step) % len)
                .find(|&i| backends[i].is_healthy())
                .ok_or(ProxyError::AllBackendsUnhealthy)?;

            let next = (index + 1) % len;
            match self.cursor.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(backends[index].clone()),
                Err(actual) => current = actual,
            }
        }
    }
}
