use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::ApiState;
use crate::error::{AppError, AppErrorKind, DomainError, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::mpesa::types::StkCallbackEnvelope;
use crate::services::callback_processor::{CallbackError, CallbackOutcome};
use crate::services::payment_initiation::InitiatePaymentInput;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub phone: Option<String>,
    pub amount: Option<BigDecimal>,
    pub lost_item_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub message: String,
    pub checkout_request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_message: Option<String>,
}

/// POST /api/payments/initiate
pub async fn initiate_payment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let attach = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    let phone = require_field(payload.phone, "phone").map_err(attach)?;
    let amount = payload
        .amount
        .ok_or_else(|| missing_field("amount"))
        .map_err(attach)?;
    let lost_item_id = require_field(payload.lost_item_id, "lost_item_id").map_err(attach)?;
    let user_id = require_field(payload.user_id, "user_id").map_err(attach)?;

    info!(
        lost_item_id = %lost_item_id,
        user_id = %user_id,
        "payment initiation requested"
    );

    let outcome = state
        .initiation
        .initiate(InitiatePaymentInput {
            phone,
            amount,
            lost_item_id,
            user_id,
        })
        .await
        .map_err(attach)?;

    Ok(Json(InitiatePaymentResponse {
        message: "STK push initiated successfully".to_string(),
        checkout_request_id: outcome.checkout_request_id,
        customer_message: outcome.customer_message,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub checkout_request_id: Option<String>,
    pub claim_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

/// GET /api/payments/status?checkout_request_id=…  (or ?claim_id=…)
pub async fn payment_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let attach = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    if let Some(checkout_id) = query
        .checkout_request_id
        .as_deref()
        .filter(|v| !v.trim().is_empty())
    {
        let payment = state
            .payments
            .find_by_checkout_id(checkout_id)
            .await
            .map_err(|e| attach(e.into()))?
            .ok_or_else(|| {
                attach(AppError::new(AppErrorKind::Domain(
                    DomainError::PaymentNotFound {
                        checkout_request_id: checkout_id.to_string(),
                    },
                )))
            })?;

        return Ok(Json(StatusResponse {
            status: payment.status,
            message: format!("Payment status for CheckoutRequestID: {}", checkout_id),
        }));
    }

    if let Some(claim_id) = query.claim_id.as_deref().filter(|v| !v.trim().is_empty()) {
        let claim_uuid = Uuid::parse_str(claim_id).map_err(|_| {
            attach(AppError::new(AppErrorKind::Domain(
                DomainError::ClaimNotFound {
                    claim_id: claim_id.to_string(),
                },
            )))
        })?;

        let claim = state
            .claim_repo
            .find_by_id(claim_uuid)
            .await
            .map_err(|e| attach(e.into()))?
            .ok_or_else(|| {
                attach(AppError::new(AppErrorKind::Domain(
                    DomainError::ClaimNotFound {
                        claim_id: claim_id.to_string(),
                    },
                )))
            })?;

        return Ok(Json(StatusResponse {
            status: claim.status,
            message: format!("Claim status for ClaimID: {}", claim_id),
        }));
    }

    Err(attach(missing_field("checkout_request_id or claim_id")))
}

/// POST /api/payments/callback
///
/// The gateway delivers results here asynchronously; the response shapes
/// follow what the gateway expects to see acknowledged.
pub async fn mpesa_callback(
    State(state): State<ApiState>,
    Json(payload): Json<JsonValue>,
) -> impl IntoResponse {
    info!("received M-Pesa callback");

    let envelope: StkCallbackEnvelope = match serde_json::from_value(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "invalid callback payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid M-Pesa callback format"})),
            )
                .into_response();
        }
    };

    match state.callbacks.process(&envelope).await {
        Ok(CallbackOutcome::Completed) | Ok(CallbackOutcome::AlreadyProcessed) => {
            (StatusCode::OK, Json(serde_json::json!({"success": true}))).into_response()
        }
        Ok(CallbackOutcome::Failed) => {
            (StatusCode::OK, Json(serde_json::json!({"status": "failed"}))).into_response()
        }
        Err(CallbackError::RecordNotFound(checkout_id)) => {
            warn!(checkout_request_id = %checkout_id, "callback for unknown payment");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Payment record not found"})),
            )
                .into_response()
        }
        Err(CallbackError::Database(e)) => {
            error!(error = %e, "callback settlement failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Database update failed"})),
            )
                .into_response()
        }
    }
}

/// GET /api/payments/callback — gateway URL verification probe.
pub async fn callback_probe() -> Json<JsonValue> {
    info!("callback URL verification probe");
    Json(serde_json::json!({"message": "Callback URL is active"}))
}

fn missing_field(field: &str) -> AppError {
    AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
        field: field.to_string(),
    }))
}

fn require_field(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(missing_field(field)),
    }
}
