//! Asynchronous callback settlement
//!
//! The gateway may deliver a result zero, one, or several times, in any
//! order relative to other callbacks. Settlement is idempotent: terminal
//! records are never rewritten, and the pending→terminal transition is a
//! single conditional update so concurrent deliveries cannot both win.

use crate::database::error::DatabaseError;
use crate::database::payment_repository::PaymentRepository;
use crate::mpesa::types::{parse_transaction_timestamp, StkCallback, StkCallbackEnvelope};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Payment record not found: {0}")]
    RecordNotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// What a delivery did to the payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// This delivery settled the payment as completed
    Completed,
    /// This delivery settled the payment as failed
    Failed,
    /// The record was already terminal; acknowledged without writing
    AlreadyProcessed,
}

pub struct CallbackProcessor {
    payments: Arc<PaymentRepository>,
}

impl CallbackProcessor {
    pub fn new(payments: Arc<PaymentRepository>) -> Self {
        Self { payments }
    }

    pub async fn process(
        &self,
        envelope: &StkCallbackEnvelope,
    ) -> Result<CallbackOutcome, CallbackError> {
        let callback = &envelope.body.stk_callback;

        if callback.is_success() {
            self.settle_success(callback).await
        } else {
            self.settle_failure(callback).await
        }
    }

    async fn settle_success(
        &self,
        callback: &StkCallback,
    ) -> Result<CallbackOutcome, CallbackError> {
        let checkout_id = &callback.checkout_request_id;
        let fields = callback.extract_fields();

        // Receipt falls back to the checkout id and the timestamp to now,
        // mirroring what the gateway omits in edge cases.
        let receipt = fields
            .receipt_number
            .clone()
            .unwrap_or_else(|| checkout_id.clone());
        let transaction_date = fields
            .transaction_date
            .as_deref()
            .and_then(parse_transaction_timestamp)
            .unwrap_or_else(Utc::now);

        let existing = self
            .payments
            .find_by_checkout_id(checkout_id)
            .await?
            .ok_or_else(|| CallbackError::RecordNotFound(checkout_id.clone()))?;

        if existing.is_terminal() {
            info!(
                checkout_request_id = %checkout_id,
                status = %existing.status,
                "duplicate callback for settled payment, acknowledging"
            );
            return Ok(CallbackOutcome::AlreadyProcessed);
        }

        match self
            .payments
            .complete_if_pending(checkout_id, &receipt, transaction_date)
            .await?
        {
            Some(payment) => {
                info!(
                    checkout_request_id = %checkout_id,
                    transaction_id = %receipt,
                    amount = %payment.amount,
                    "payment completed"
                );
                Ok(CallbackOutcome::Completed)
            }
            None => {
                // Lost a race with a concurrent delivery between the read
                // above and the conditional update.
                info!(
                    checkout_request_id = %checkout_id,
                    "payment already settled by concurrent delivery"
                );
                Ok(CallbackOutcome::AlreadyProcessed)
            }
        }
    }

    async fn settle_failure(
        &self,
        callback: &StkCallback,
    ) -> Result<CallbackOutcome, CallbackError> {
        let checkout_id = &callback.checkout_request_id;
        let reason = callback
            .result_desc
            .clone()
            .filter(|desc| !desc.trim().is_empty())
            .unwrap_or_else(|| format!("Payment failed with result code {}", callback.result_code));

        let existing = self
            .payments
            .find_by_checkout_id(checkout_id)
            .await?
            .ok_or_else(|| CallbackError::RecordNotFound(checkout_id.clone()))?;

        if existing.is_terminal() {
            info!(
                checkout_request_id = %checkout_id,
                status = %existing.status,
                "duplicate failure callback for settled payment, acknowledging"
            );
            return Ok(CallbackOutcome::AlreadyProcessed);
        }

        match self.payments.fail_if_pending(checkout_id, &reason).await? {
            Some(_) => {
                warn!(
                    checkout_request_id = %checkout_id,
                    result_code = callback.result_code,
                    reason = %reason,
                    "payment failed"
                );
                Ok(CallbackOutcome::Failed)
            }
            None => Ok(CallbackOutcome::AlreadyProcessed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_reason_falls_back_to_result_code() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "CheckoutRequestID": "ws_CO_1",
                    "ResultCode": 1037,
                    "ResultDesc": "   "
                }
            }
        });
        let envelope: StkCallbackEnvelope =
            serde_json::from_value(payload).expect("envelope should parse");
        let callback = &envelope.body.stk_callback;
        let reason = callback
            .result_desc
            .clone()
            .filter(|desc| !desc.trim().is_empty())
            .unwrap_or_else(|| format!("Payment failed with result code {}", callback.result_code));
        assert_eq!(reason, "Payment failed with result code 1037");
    }

    #[test]
    fn outcome_equality() {
        assert_eq!(CallbackOutcome::Completed, CallbackOutcome::Completed);
        assert_ne!(CallbackOutcome::Completed, CallbackOutcome::AlreadyProcessed);
    }
}
