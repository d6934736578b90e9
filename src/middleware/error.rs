//! Error response formatting
//!
//! Provides standardized error responses with consistent JSON structure,
//! HTTP status codes, error codes, and user-friendly messages.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
///
/// This is returned to clients for all error cases, ensuring
/// consistent error handling across the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    /// Create a new error response from an AppError
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(error.is_retryable()),
        }
    }

    /// Create a generic internal server error response
    pub fn internal_error(request_id: Option<String>) -> Self {
        Self {
            error: ErrorCode::InternalError,
            message: "An internal server error occurred. Please try again later.".to_string(),
            request_id,
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(false),
        }
    }
}

/// Implement IntoResponse for AppError to automatically convert errors
/// into HTTP responses with proper status codes and JSON formatting
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Helper to extract request ID from request headers
pub fn get_request_id_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, DomainError, ValidationError};
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn test_error_response_from_app_error() {
        let app_error = AppError::new(AppErrorKind::Domain(DomainError::PaymentNotConfirmed {
            checkout_request_id: "ws_CO_1".to_string(),
            status: "pending".to_string(),
        }))
        .with_request_id("req_123");

        let error_response = ErrorResponse::from_app_error(&app_error);

        assert_eq!(error_response.error, ErrorCode::PaymentNotConfirmed);
        assert_eq!(error_response.request_id, Some("req_123".to_string()));
        assert!(error_response.message.contains("not completed"));
    }

    #[test]
    fn test_app_error_into_response() {
        let app_error = AppError::new(AppErrorKind::Validation(
            ValidationError::InvalidPhoneNumber {
                phone: "0712345678".to_string(),
            },
        ));

        let response = app_error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_response() {
        let error = ErrorResponse::internal_error(Some("req_456".to_string()));

        assert_eq!(error.error, ErrorCode::InternalError);
        assert_eq!(error.request_id, Some("req_456".to_string()));
        assert!(error.message.contains("internal server error"));
    }

    #[test]
    fn test_status_code_mapping() {
        let not_confirmed =
            AppError::new(AppErrorKind::Domain(DomainError::PaymentNotConfirmed {
                checkout_request_id: "ws_CO_1".to_string(),
                status: "pending".to_string(),
            }));
        assert_eq!(not_confirmed.status_code(), 402);

        let duplicate = AppError::new(AppErrorKind::Domain(DomainError::DuplicateClaim {
            lost_item_id: "L1".to_string(),
            user_id: "U1".to_string(),
        }));
        assert_eq!(duplicate.status_code(), 409);
    }
}
