use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Payment lifecycle states. Stored as text; transitions are enforced by the
/// conditional updates below, never by read-then-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// Payment record entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub user_id: String,
    pub lost_item_id: String,
    pub category_id: String,
    pub phone: String,
    pub amount: BigDecimal,
    pub method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub transaction_date: Option<chrono::DateTime<chrono::Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl PaymentRecord {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed.as_str()
    }

    pub fn is_terminal(&self) -> bool {
        self.status != PaymentStatus::Pending.as_str()
    }
}

/// Fields for a new pending payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub user_id: String,
    pub lost_item_id: String,
    pub category_id: String,
    pub phone: String,
    pub amount: BigDecimal,
}

const PAYMENT_COLUMNS: &str = "id, checkout_request_id, merchant_request_id, user_id, \
     lost_item_id, category_id, phone, amount, method, status, transaction_id, \
     transaction_date, failure_reason, created_at, updated_at";

/// Repository for payment records
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new payment in `pending` state.
    pub async fn insert_pending(&self, payment: &NewPayment) -> Result<PaymentRecord, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "INSERT INTO payments \
             (checkout_request_id, merchant_request_id, user_id, lost_item_id, category_id, \
              phone, amount, method, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'mpesa', 'pending') \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(&payment.checkout_request_id)
        .bind(&payment.merchant_request_id)
        .bind(&payment.user_id)
        .bind(&payment.lost_item_id)
        .bind(&payment.category_id)
        .bind(&payment.phone)
        .bind(&payment.amount)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find a payment by the gateway's checkout request identifier.
    pub async fn find_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE checkout_request_id = $1"
        ))
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Transition `pending → completed` atomically.
    ///
    /// The status guard lives in the UPDATE itself, so two concurrent
    /// callback deliveries cannot both settle the row; the loser observes
    /// `None` and acknowledges without writing.
    pub async fn complete_if_pending(
        &self,
        checkout_request_id: &str,
        transaction_id: &str,
        transaction_date: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payments \
             SET status = 'completed', transaction_id = $2, transaction_date = $3, \
                 updated_at = NOW() \
             WHERE checkout_request_id = $1 AND status = 'pending' \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(checkout_request_id)
        .bind(transaction_id)
        .bind(transaction_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Transition `pending → failed` atomically.
    pub async fn fail_if_pending(
        &self,
        checkout_request_id: &str,
        failure_reason: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "UPDATE payments \
             SET status = 'failed', failure_reason = $2, updated_at = NOW() \
             WHERE checkout_request_id = $1 AND status = 'pending' \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(checkout_request_id)
        .bind(failure_reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Pending payments older than `min_age_secs`, oldest first, for the
    /// reconciliation sweep.
    pub async fn find_stale_pending(
        &self,
        min_age_secs: i32,
        limit: i64,
    ) -> Result<Vec<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE status = 'pending' AND created_at < NOW() - INTERVAL '1 second' * $1 \
             ORDER BY created_at ASC \
             LIMIT $2"
        ))
        .bind(min_age_secs)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!(PaymentStatus::Pending.as_str(), "pending");
        assert_eq!(PaymentStatus::Completed.as_str(), "completed");
        assert_eq!(PaymentStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn terminal_detection() {
        let mut record = PaymentRecord {
            id: Uuid::new_v4(),
            checkout_request_id: "ws_CO_1".to_string(),
            merchant_request_id: None,
            user_id: "U1".to_string(),
            lost_item_id: "L1".to_string(),
            category_id: "C1".to_string(),
            phone: "254712345678".to_string(),
            amount: BigDecimal::from(300),
            method: "mpesa".to_string(),
            status: "pending".to_string(),
            transaction_id: None,
            transaction_date: None,
            failure_reason: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(!record.is_terminal());
        assert!(!record.is_completed());

        record.status = "completed".to_string();
        assert!(record.is_terminal());
        assert!(record.is_completed());

        record.status = "failed".to_string();
        assert!(record.is_terminal());
        assert!(!record.is_completed());
    }
}
