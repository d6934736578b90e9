//! Claim submission gate
//!
//! A claim is accepted only when the referenced payment is completed and
//! belongs to the same user and lost item, and at most one claim may exist
//! per (lost item, user) pair. The duplicate check is performed up front for
//! a friendly error, but the claims table's unique index is what holds under
//! concurrent submissions.

use crate::database::claim_repository::{ClaimRecord, ClaimRepository, NewClaim};
use crate::database::payment_repository::PaymentRepository;
use crate::error::{AppError, AppErrorKind, AppResult, DomainError, ValidationError};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ClaimSubmission {
    pub lost_item_id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub comments: String,
    pub checkout_request_id: String,
}

impl ClaimSubmission {
    /// All contact and reference fields are required.
    pub fn validate(&self) -> AppResult<()> {
        let required = [
            ("lost_item_id", &self.lost_item_id),
            ("user_id", &self.user_id),
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("comments", &self.comments),
            ("checkout_request_id", &self.checkout_request_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::new(AppErrorKind::Validation(
                    ValidationError::MissingField {
                        field: field.to_string(),
                    },
                )));
            }
        }
        Ok(())
    }
}

pub struct ClaimService {
    payments: Arc<PaymentRepository>,
    claims: Arc<ClaimRepository>,
}

impl ClaimService {
    pub fn new(payments: Arc<PaymentRepository>, claims: Arc<ClaimRepository>) -> Self {
        Self { payments, claims }
    }

    pub async fn submit(&self, submission: ClaimSubmission) -> AppResult<ClaimRecord> {
        submission.validate()?;

        let payment = self
            .payments
            .find_by_checkout_id(&submission.checkout_request_id)
            .await?
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Domain(DomainError::PaymentNotFound {
                    checkout_request_id: submission.checkout_request_id.clone(),
                }))
            })?;

        if payment.user_id != submission.user_id || payment.lost_item_id != submission.lost_item_id
        {
            return Err(AppError::new(AppErrorKind::Domain(
                DomainError::ClaimMismatch {
                    message: "Payment was made for a different user or lost item".to_string(),
                },
            )));
        }

        if !payment.is_completed() {
            return Err(AppError::new(AppErrorKind::Domain(
                DomainError::PaymentNotConfirmed {
                    checkout_request_id: submission.checkout_request_id.clone(),
                    status: payment.status.clone(),
                },
            )));
        }

        if self
            .claims
            .exists_for_item_and_user(&submission.lost_item_id, &submission.user_id)
            .await?
        {
            return Err(duplicate_claim(&submission));
        }

        let new_claim = NewClaim {
            lost_item_id: submission.lost_item_id.clone(),
            user_id: submission.user_id.clone(),
            category_id: payment.category_id.clone(),
            name: submission.name.clone(),
            email: submission.email.clone(),
            phone: submission.phone.clone(),
            comments: submission.comments.clone(),
            payment_status: payment.status.clone(),
        };

        let claim = match self.claims.insert(&new_claim).await {
            Ok(claim) => claim,
            // The unique index caught a submission racing past the
            // pre-check above.
            Err(e) if e.is_unique_violation() => return Err(duplicate_claim(&submission)),
            Err(e) => return Err(e.into()),
        };

        info!(
            claim_id = %claim.id,
            lost_item_id = %claim.lost_item_id,
            user_id = %claim.user_id,
            "claim submitted"
        );

        Ok(claim)
    }
}

fn duplicate_claim(submission: &ClaimSubmission) -> AppError {
    AppError::new(AppErrorKind::Domain(DomainError::DuplicateClaim {
        lost_item_id: submission.lost_item_id.clone(),
        user_id: submission.user_id.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn submission() -> ClaimSubmission {
        ClaimSubmission {
            lost_item_id: "L1".to_string(),
            user_id: "U1".to_string(),
            name: "Jane Student".to_string(),
            email: "jane@students.jkuat.ac.ke".to_string(),
            phone: "254712345678".to_string(),
            comments: "Lost near the library".to_string(),
            checkout_request_id: "ws_CO_1".to_string(),
        }
    }

    #[test]
    fn complete_submission_validates() {
        assert!(submission().validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut sub = submission();
        sub.email = "  ".to_string();
        let err = sub.validate().expect_err("blank email should fail");
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
        assert!(err.user_message().contains("email"));
    }

    #[test]
    fn missing_checkout_reference_is_rejected() {
        let mut sub = submission();
        sub.checkout_request_id = String::new();
        assert!(sub.validate().is_err());
    }
}
