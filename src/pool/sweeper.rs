//! Background expiry sweeper.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::pool::DynamicProxyPool;

/// Periodically reclaims expired leases and idle sticky bindings.
#[derive(Debug)]
pub struct LeaseSweeper {
    pool: Arc<DynamicProxyPool>,
    interval: Duration,
}

impl LeaseSweeper {
    pub fn new(pool: Arc<DynamicProxyPool>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    /// Interval taken from `pool.sweep_interval_secs`.
    pub fn from_settings(pool: Arc<DynamicProxyPool>) -> Self {
        let interval = Duration::from_secs(pool.settings().sweep_interval_secs.max(1));
        Self::new(pool, interval)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Lease sweeper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.pool.sweep_expired();
                    if report.expired_leases > 0 || report.pruned_bindings > 0 {
                        tracing::info!(
                            expired_leases = report.expired_leases,
                            pruned_bindings = report.pruned_bindings,
                            "Sweep reclaimed resources"
                        );
                    } else {
                        tracing::debug!(outstanding = self.pool.outstanding_leases(), "Sweep found nothing to reclaim");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Lease sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
