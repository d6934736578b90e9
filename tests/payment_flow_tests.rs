//! Settlement-path tests against a live database.
//!
//! These exercise the conditional status transitions that make callback
//! delivery idempotent. They are ignored by default; run them with a
//! `DATABASE_URL` pointing at a migrated database:
//!
//!   cargo test -- --ignored

use bigdecimal::BigDecimal;
use chrono::Utc;
use findmylostid_backend::database::payment_repository::{NewPayment, PaymentRepository};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn pool() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("database should be reachable")
}

fn new_payment(checkout_request_id: &str) -> NewPayment {
    NewPayment {
        checkout_request_id: checkout_request_id.to_string(),
        merchant_request_id: Some("29115-34620561-1".to_string()),
        user_id: "U1".to_string(),
        lost_item_id: "L1".to_string(),
        category_id: "C1".to_string(),
        phone: "254712345678".to_string(),
        amount: BigDecimal::from(300),
    }
}

#[tokio::test]
#[ignore] // Requires database running
async fn pending_payment_completes_exactly_once() {
    let repo = PaymentRepository::new(pool().await);
    let checkout_id = format!("ws_test_{}", Uuid::new_v4());

    let inserted = repo
        .insert_pending(&new_payment(&checkout_id))
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.status, "pending");

    let first = repo
        .complete_if_pending(&checkout_id, "ABC123", Utc::now())
        .await
        .expect("update should succeed");
    assert!(first.is_some(), "first settlement should win");
    assert_eq!(first.unwrap().transaction_id.as_deref(), Some("ABC123"));

    // Redelivery of the same callback must be a no-op.
    let second = repo
        .complete_if_pending(&checkout_id, "XYZ999", Utc::now())
        .await
        .expect("update should succeed");
    assert!(second.is_none(), "second settlement must not rewrite");

    let stored = repo
        .find_by_checkout_id(&checkout_id)
        .await
        .expect("lookup should succeed")
        .expect("record should exist");
    assert_eq!(stored.status, "completed");
    assert_eq!(stored.transaction_id.as_deref(), Some("ABC123"));
}

#[tokio::test]
#[ignore] // Requires database running
async fn completed_payment_is_not_overwritten_by_failure() {
    let repo = PaymentRepository::new(pool().await);
    let checkout_id = format!("ws_test_{}", Uuid::new_v4());

    repo.insert_pending(&new_payment(&checkout_id))
        .await
        .expect("insert should succeed");
    repo.complete_if_pending(&checkout_id, "ABC123", Utc::now())
        .await
        .expect("update should succeed");

    let failed = repo
        .fail_if_pending(&checkout_id, "Request cancelled by user")
        .await
        .expect("update should succeed");
    assert!(failed.is_none(), "terminal record must stay completed");

    let stored = repo
        .find_by_checkout_id(&checkout_id)
        .await
        .expect("lookup should succeed")
        .expect("record should exist");
    assert_eq!(stored.status, "completed");
    assert!(stored.failure_reason.is_none());
}

#[tokio::test]
#[ignore] // Requires database running
async fn duplicate_checkout_id_is_rejected() {
    let repo = PaymentRepository::new(pool().await);
    let checkout_id = format!("ws_test_{}", Uuid::new_v4());

    repo.insert_pending(&new_payment(&checkout_id))
        .await
        .expect("first insert should succeed");

    let duplicate = repo.insert_pending(&new_payment(&checkout_id)).await;
    let err = duplicate.expect_err("second insert must violate uniqueness");
    assert!(err.is_unique_violation());
}
