//! Payment initiation
//!
//! Validates the request, resolves the required recovery fee from the
//! catalog, pushes the STK prompt to the payer's handset, and records the
//! pending payment keyed by the gateway's checkout request identifier.

use crate::database::catalog_repository::CatalogRepository;
use crate::database::payment_repository::{NewPayment, PaymentRepository};
use crate::error::{
    AppError, AppErrorKind, AppResult, DomainError, InfrastructureError, ValidationError,
};
use crate::mpesa::{DarajaClient, StkPushArgs};
use bigdecimal::BigDecimal;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{error, info};

/// Kenyan mobile number in international form: 254 followed by a 7xx or 1xx
/// prefix and eight more digits.
const PHONE_PATTERN: &str = r"^254(7|1)\d{8}$";

fn phone_regex() -> &'static Regex {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    PHONE_REGEX.get_or_init(|| Regex::new(PHONE_PATTERN).expect("phone pattern is valid"))
}

/// Validate a payer phone number before any network call is made.
pub fn validate_phone(phone: &str) -> bool {
    phone_regex().is_match(phone)
}

#[derive(Debug, Clone)]
pub struct InitiatePaymentInput {
    pub phone: String,
    pub amount: BigDecimal,
    pub lost_item_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct InitiationOutcome {
    pub checkout_request_id: String,
    pub customer_message: Option<String>,
}

pub struct PaymentInitiationService {
    gateway: Arc<DarajaClient>,
    payments: Arc<PaymentRepository>,
    catalog: Arc<CatalogRepository>,
}

impl PaymentInitiationService {
    pub fn new(
        gateway: Arc<DarajaClient>,
        payments: Arc<PaymentRepository>,
        catalog: Arc<CatalogRepository>,
    ) -> Self {
        Self {
            gateway,
            payments,
            catalog,
        }
    }

    pub async fn initiate(&self, input: InitiatePaymentInput) -> AppResult<InitiationOutcome> {
        self.validate(&input)?;

        // Resolve the item's category and its configured recovery fee; the
        // submitted amount must match exactly.
        let category_id = self
            .catalog
            .category_for_lost_item(&input.lost_item_id)
            .await?
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Domain(DomainError::LostItemNotFound {
                    lost_item_id: input.lost_item_id.clone(),
                }))
            })?;

        let required_fee = self
            .catalog
            .recovery_fee(&category_id)
            .await?
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Domain(DomainError::CategoryNotFound {
                    category_id: category_id.clone(),
                }))
            })?;

        if input.amount != required_fee {
            return Err(AppError::new(AppErrorKind::Domain(DomainError::FeeMismatch {
                required: required_fee.to_string(),
                provided: input.amount.to_string(),
            })));
        }

        let ack = self
            .gateway
            .stk_push(&StkPushArgs {
                phone: input.phone.clone(),
                amount: input.amount.clone(),
                account_reference: input.lost_item_id.clone(),
                description: "Payment for Lost Item".to_string(),
            })
            .await?;

        let record = NewPayment {
            checkout_request_id: ack.checkout_request_id.clone(),
            merchant_request_id: ack.merchant_request_id.clone(),
            user_id: input.user_id,
            lost_item_id: input.lost_item_id,
            category_id,
            phone: input.phone,
            amount: input.amount,
        };

        match self.payments.insert_pending(&record).await {
            Ok(payment) => {
                info!(
                    checkout_request_id = %payment.checkout_request_id,
                    user_id = %payment.user_id,
                    lost_item_id = %payment.lost_item_id,
                    "pending payment recorded"
                );
                Ok(InitiationOutcome {
                    checkout_request_id: ack.checkout_request_id,
                    customer_message: ack.customer_message,
                })
            }
            Err(e) => {
                // The gateway has already accepted the push; without a local
                // row the reconciler has no key to recover by. Loud log so an
                // operator can repair from gateway records.
                error!(
                    checkout_request_id = %ack.checkout_request_id,
                    error = %e,
                    "payment accepted by gateway but local record insert failed"
                );
                Err(AppError::new(AppErrorKind::Infrastructure(
                    InfrastructureError::Database {
                        message: "Failed to save payment record in database".to_string(),
                        is_retryable: false,
                    },
                )))
            }
        }
    }

    fn validate(&self, input: &InitiatePaymentInput) -> AppResult<()> {
        if input.phone.trim().is_empty() {
            return Err(missing_field("phone"));
        }
        if input.lost_item_id.trim().is_empty() {
            return Err(missing_field("lost_item_id"));
        }
        if input.user_id.trim().is_empty() {
            return Err(missing_field("user_id"));
        }

        if !validate_phone(&input.phone) {
            return Err(AppError::new(AppErrorKind::Validation(
                ValidationError::InvalidPhoneNumber {
                    phone: input.phone.clone(),
                },
            )));
        }

        if input.amount <= BigDecimal::from(0) {
            return Err(AppError::new(AppErrorKind::Validation(
                ValidationError::InvalidAmount {
                    amount: input.amount.to_string(),
                    reason: "amount must be greater than zero".to_string(),
                },
            )));
        }

        Ok(())
    }
}

fn missing_field(field: &str) -> AppError {
    AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
        field: field.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_safaricom_numbers() {
        assert!(validate_phone("254712345678"));
        assert!(validate_phone("254110345678"));
    }

    #[test]
    fn rejects_local_and_malformed_numbers() {
        assert!(!validate_phone("0712345678"));
        assert!(!validate_phone("254812345678"));
        assert!(!validate_phone("25471234567"));
        assert!(!validate_phone("2547123456789"));
        assert!(!validate_phone("+254712345678"));
        assert!(!validate_phone("25471234567a"));
    }
}
