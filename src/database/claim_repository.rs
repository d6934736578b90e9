use crate::database::error::DatabaseError;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Claim record entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClaimRecord {
    pub id: Uuid,
    pub lost_item_id: String,
    pub user_id: String,
    pub category_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub comments: String,
    pub payment_status: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Fields for a new claim row. Claims always start in `pending` review state
/// with the payment status copied from the settled payment.
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub lost_item_id: String,
    pub user_id: String,
    pub category_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub comments: String,
    pub payment_status: String,
}

const CLAIM_COLUMNS: &str = "id, lost_item_id, user_id, category_id, name, email, phone, \
     comments, payment_status, status, created_at";

/// Repository for claim records
pub struct ClaimRepository {
    pool: PgPool,
}

impl ClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a claim. The UNIQUE (lost_item_id, user_id) index turns a
    /// concurrent duplicate submission into a `Duplicate` error.
    pub async fn insert(&self, claim: &NewClaim) -> Result<ClaimRecord, DatabaseError> {
        sqlx::query_as::<_, ClaimRecord>(&format!(
            "INSERT INTO claims \
             (lost_item_id, user_id, category_id, name, email, phone, comments, \
              payment_status, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending') \
             RETURNING {CLAIM_COLUMNS}"
        ))
        .bind(&claim.lost_item_id)
        .bind(&claim.user_id)
        .bind(&claim.category_id)
        .bind(&claim.name)
        .bind(&claim.email)
        .bind(&claim.phone)
        .bind(&claim.comments)
        .bind(&claim.payment_status)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ClaimRecord>, DatabaseError> {
        sqlx::query_as::<_, ClaimRecord>(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claims WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Whether a claim already exists for this lost item and user.
    pub async fn exists_for_item_and_user(
        &self,
        lost_item_id: &str,
        user_id: &str,
    ) -> Result<bool, DatabaseError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM claims WHERE lost_item_id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(lost_item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.is_some())
    }

}
