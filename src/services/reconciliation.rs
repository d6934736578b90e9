//! Reconciliation of payments whose callback never arrived
//!
//! A lost callback would otherwise leave a payment `pending` forever. The
//! sweep queries the gateway's STK status endpoint for pending payments older
//! than a threshold and applies the verdict through the same conditional
//! updates the callback path uses, so a late callback racing the sweep still
//! settles the record exactly once.

use crate::database::error::DatabaseError;
use crate::database::payment_repository::PaymentRepository;
use crate::mpesa::DarajaClient;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-cycle result counts, for the worker's log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub scanned: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
}

pub struct ReconciliationService {
    gateway: Arc<DarajaClient>,
    payments: Arc<PaymentRepository>,
}

impl ReconciliationService {
    pub fn new(gateway: Arc<DarajaClient>, payments: Arc<PaymentRepository>) -> Self {
        Self { gateway, payments }
    }

    /// One reconciliation pass over pending payments older than
    /// `min_age_secs`, capped at `batch_size` records.
    pub async fn sweep(
        &self,
        min_age_secs: i32,
        batch_size: i64,
    ) -> Result<SweepSummary, DatabaseError> {
        let stale = self
            .payments
            .find_stale_pending(min_age_secs, batch_size)
            .await?;

        let mut summary = SweepSummary {
            scanned: stale.len(),
            ..SweepSummary::default()
        };

        for payment in stale {
            let checkout_id = payment.checkout_request_id.clone();
            match self.gateway.query_stk_status(&checkout_id).await {
                Ok(response) if response.is_success() => {
                    // The query API reports the verdict but not the receipt
                    // number; the checkout id stands in as the transaction
                    // reference, matching the callback path's fallback.
                    match self
                        .payments
                        .complete_if_pending(&checkout_id, &checkout_id, Utc::now())
                        .await
                    {
                        Ok(Some(_)) => {
                            info!(
                                checkout_request_id = %checkout_id,
                                "reconciler completed payment with lost callback"
                            );
                            summary.completed += 1;
                        }
                        Ok(None) => summary.still_pending += 1, // settled concurrently
                        Err(e) => {
                            warn!(checkout_request_id = %checkout_id, error = %e, "reconciler update failed");
                            summary.errors += 1;
                        }
                    }
                }
                Ok(response) => {
                    let reason = response
                        .result_desc
                        .clone()
                        .filter(|desc| !desc.trim().is_empty())
                        .unwrap_or_else(|| {
                            format!("Payment failed with result code {}", response.result_code)
                        });
                    match self.payments.fail_if_pending(&checkout_id, &reason).await {
                        Ok(Some(_)) => {
                            info!(
                                checkout_request_id = %checkout_id,
                                result_code = %response.result_code,
                                "reconciler failed payment with lost callback"
                            );
                            summary.failed += 1;
                        }
                        Ok(None) => summary.still_pending += 1,
                        Err(e) => {
                            warn!(checkout_request_id = %checkout_id, error = %e, "reconciler update failed");
                            summary.errors += 1;
                        }
                    }
                }
                Err(e) if e.is_still_processing() => {
                    summary.still_pending += 1;
                }
                Err(e) => {
                    // Gateway unreachable or rejecting the query; leave the
                    // record for the next cycle.
                    warn!(
                        checkout_request_id = %checkout_id,
                        error = %e,
                        "reconciler status query failed"
                    );
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_defaults_to_zero() {
        let summary = SweepSummary::default();
        assert_eq!(summary.scanned, 0);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.still_pending, 0);
        assert_eq!(summary.errors, 0);
    }
}
