use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use sqlx::PgPool;

/// Read-only access to the lost-item catalog owned by the admin application.
/// Payment initiation uses it to resolve the category and required recovery
/// fee for a lost item; nothing here is ever written by this service.
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Category identifier for a lost item, if the item exists.
    pub async fn category_for_lost_item(
        &self,
        lost_item_id: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT category_id FROM lost_ids WHERE id = $1")
                .bind(lost_item_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(category_id,)| category_id))
    }

    /// Configured recovery fee for a category, if the category exists.
    pub async fn recovery_fee(
        &self,
        category_id: &str,
    ) -> Result<Option<BigDecimal>, DatabaseError> {
        let row: Option<(BigDecimal,)> =
            sqlx::query_as("SELECT recovery_fee FROM id_categories WHERE id = $1")
                .bind(category_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(fee,)| fee))
    }
}
