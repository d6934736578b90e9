//! Unified error handling for the Find My Lost ID backend
//!
//! This module provides a single application error type with proper HTTP
//! status mapping, user-friendly messages, and structured error codes for
//! client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "PAYMENT_NOT_FOUND")]
    PaymentNotFound,
    #[serde(rename = "CLAIM_NOT_FOUND")]
    ClaimNotFound,
    #[serde(rename = "LOST_ITEM_NOT_FOUND")]
    LostItemNotFound,
    #[serde(rename = "CATEGORY_NOT_FOUND")]
    CategoryNotFound,
    #[serde(rename = "PAYMENT_NOT_CONFIRMED")]
    PaymentNotConfirmed,
    #[serde(rename = "DUPLICATE_CLAIM")]
    DuplicateClaim,
    #[serde(rename = "FEE_MISMATCH")]
    FeeMismatch,
    #[serde(rename = "CLAIM_MISMATCH")]
    ClaimMismatch,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 429)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No payment record exists for the given checkout request identifier
    PaymentNotFound { checkout_request_id: String },
    /// No claim record exists for the given identifier
    ClaimNotFound { claim_id: String },
    /// The referenced lost item does not exist in the catalog
    LostItemNotFound { lost_item_id: String },
    /// The lost item's category has no configured recovery fee
    CategoryNotFound { category_id: String },
    /// The referenced payment has not reached `completed` status
    PaymentNotConfirmed {
        checkout_request_id: String,
        status: String,
    },
    /// A claim already exists for this lost item and user
    DuplicateClaim {
        lost_item_id: String,
        user_id: String,
    },
    /// The paid amount does not match the category's recovery fee
    FeeMismatch { required: String, provided: String },
    /// The payment belongs to a different user or lost item
    ClaimMismatch { message: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors (payment gateway)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// M-Pesa gateway error
    PaymentGateway {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Phone number does not match the expected mobile format
    InvalidPhoneNumber { phone: String },
    /// Invalid amount (format or value)
    InvalidAmount { amount: String, reason: String },
    /// Required field missing
    MissingField { field: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound { .. } => 404,
                DomainError::ClaimNotFound { .. } => 404,
                DomainError::LostItemNotFound { .. } => 404,
                DomainError::CategoryNotFound { .. } => 404,
                DomainError::PaymentNotConfirmed { .. } => 402, // Payment Required
                DomainError::DuplicateClaim { .. } => 409,      // Conflict
                DomainError::FeeMismatch { .. } => 400,
                DomainError::ClaimMismatch { .. } => 409,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => 502, // Bad Gateway
                ExternalError::RateLimit { .. } => 429,      // Too Many Requests
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound { .. } => ErrorCode::PaymentNotFound,
                DomainError::ClaimNotFound { .. } => ErrorCode::ClaimNotFound,
                DomainError::LostItemNotFound { .. } => ErrorCode::LostItemNotFound,
                DomainError::CategoryNotFound { .. } => ErrorCode::CategoryNotFound,
                DomainError::PaymentNotConfirmed { .. } => ErrorCode::PaymentNotConfirmed,
                DomainError::DuplicateClaim { .. } => ErrorCode::DuplicateClaim,
                DomainError::FeeMismatch { .. } => ErrorCode::FeeMismatch,
                DomainError::ClaimMismatch { .. } => ErrorCode::ClaimMismatch,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound {
                    checkout_request_id,
                } => {
                    format!("Payment '{}' not found", checkout_request_id)
                }
                DomainError::ClaimNotFound { claim_id } => {
                    format!("Claim '{}' not found", claim_id)
                }
                DomainError::LostItemNotFound { lost_item_id } => {
                    format!("Lost item '{}' not found", lost_item_id)
                }
                DomainError::CategoryNotFound { category_id } => {
                    format!("Category '{}' not found", category_id)
                }
                DomainError::PaymentNotConfirmed {
                    checkout_request_id,
                    status,
                } => {
                    format!(
                        "Payment '{}' is not completed (current status: {}). Cannot submit claim",
                        checkout_request_id, status
                    )
                }
                DomainError::DuplicateClaim {
                    lost_item_id,
                    user_id,
                } => {
                    format!(
                        "A claim for lost item '{}' by user '{}' already exists",
                        lost_item_id, user_id
                    )
                }
                DomainError::FeeMismatch { required, provided } => {
                    format!(
                        "Incorrect amount '{}'. The required recovery fee is KES {}",
                        provided, required
                    )
                }
                DomainError::ClaimMismatch { message } => message.clone(),
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!("Rate limit exceeded for {}. Please try again later", service)
                    }
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidPhoneNumber { phone } => {
                    format!(
                        "Invalid phone number '{}'. Use the 2547XXXXXXXX format",
                        phone
                    )
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<crate::database::error::DatabaseError> for AppError {
    fn from(err: crate::database::error::DatabaseError) -> Self {
        use crate::database::error::DatabaseErrorKind;

        let is_retryable = matches!(err.kind, DatabaseErrorKind::Connection { .. });
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable,
        }))
    }
}

impl From<crate::mpesa::error::GatewayError> for AppError {
    fn from(err: crate::mpesa::error::GatewayError) -> Self {
        use crate::mpesa::error::GatewayError as GE;

        let kind = match &err {
            GE::Validation { message, .. } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration {
                    message: message.clone(),
                })
            }
            GE::RateLimited {
                retry_after_seconds,
                ..
            } => AppErrorKind::External(ExternalError::RateLimit {
                service: "mpesa".to_string(),
                retry_after: *retry_after_seconds,
            }),
            _ => AppErrorKind::External(ExternalError::PaymentGateway {
                provider: "mpesa".to_string(),
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };

        AppError::new(kind)
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
