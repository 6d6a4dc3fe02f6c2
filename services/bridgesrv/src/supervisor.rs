//! Pump supervision
//!
//! Wraps a pump's run cycle in an unconditional restart loop: every
//! completion, success or failure alike, is followed by one restart after a
//! fixed failover delay, forever. There is no backoff growth, no retry
//! budget, and no circuit breaker; the only way out is external shutdown.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;

pub struct Supervisor {
    name: String,
    failover_delay: Duration,
}

impl Supervisor {
    pub fn new(name: impl Into<String>, failover_delay: Duration) -> Self {
        Self {
            name: name.into(),
            failover_delay,
        }
    }

    /// Run `cycle` in a restart loop until `shutdown` fires.
    pub async fn supervise<F, Fut>(&self, shutdown: CancellationToken, mut cycle: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        loop {
            info!(pump = %self.name, "starting run cycle");
            match cycle().await {
                Ok(()) => info!(pump = %self.name, "run cycle completed"),
                Err(e) => error!(pump = %self.name, "run cycle failed: {e}"),
            }

            if shutdown.is_cancelled() {
                info!(pump = %self.name, "supervisor shut down");
                return;
            }
            info!(
                pump = %self.name,
                delay_ms = self.failover_delay.as_millis() as u64,
                "restarting after failover delay"
            );
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(pump = %self.name, "supervisor shut down");
                    return;
                }
                _ = tokio::time::sleep(self.failover_delay) => {}
            }
        }
    }
}
