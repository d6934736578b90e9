use crate::services::reconciliation::ReconciliationService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often the worker wakes up to sweep pending payments.
    pub poll_interval: Duration,
    /// Minimum age of a pending payment before it is queried at the gateway;
    /// younger records are expected to settle via the normal callback.
    pub min_pending_age: Duration,
    /// Maximum number of pending payments queried per cycle.
    pub batch_size: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(120),
            min_pending_age: Duration::from_secs(180),
            batch_size: 100,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.poll_interval = Duration::from_secs(
            std::env::var("RECONCILER_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.poll_interval.as_secs()),
        );
        cfg.min_pending_age = Duration::from_secs(
            std::env::var("RECONCILER_MIN_PENDING_AGE_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.min_pending_age.as_secs()),
        );
        cfg.batch_size = std::env::var("RECONCILER_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(cfg.batch_size);
        cfg
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct PaymentReconcilerWorker {
    service: Arc<ReconciliationService>,
    config: ReconcilerConfig,
}

impl PaymentReconcilerWorker {
    pub fn new(service: Arc<ReconciliationService>, config: ReconcilerConfig) -> Self {
        Self { service, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            min_pending_age_secs = self.config.min_pending_age.as_secs(),
            batch_size = self.config.batch_size,
            "payment reconciler worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("payment reconciler worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    match self
                        .service
                        .sweep(self.config.min_pending_age.as_secs() as i32, self.config.batch_size)
                        .await
                    {
                        Ok(summary) => {
                            if summary.scanned > 0 {
                                info!(
                                    scanned = summary.scanned,
                                    completed = summary.completed,
                                    failed = summary.failed,
                                    still_pending = summary.still_pending,
                                    errors = summary.errors,
                                    "reconciliation sweep finished"
                                );
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "reconciliation sweep failed");
                        }
                    }
                }
            }
        }

        info!("payment reconciler worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let cfg = ReconcilerConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(120));
        assert_eq!(cfg.min_pending_age, Duration::from_secs(180));
        assert_eq!(cfg.batch_size, 100);
    }
}
