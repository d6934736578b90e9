use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::ApiState;
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::services::claim_gate::ClaimSubmission;

#[derive(Debug, Deserialize)]
pub struct SubmitClaimRequest {
    pub lost_item_id: Option<String>,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub comments: Option<String>,
    pub checkout_request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitClaimResponse {
    pub message: String,
    pub status: String,
    pub claim_id: Uuid,
}

/// POST /api/claims
pub async fn submit_claim(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitClaimRequest>,
) -> Result<(StatusCode, Json<SubmitClaimResponse>), AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let attach = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    // Missing fields become empty strings; the submission's own validation
    // reports the first offending field by name.
    let submission = ClaimSubmission {
        lost_item_id: payload.lost_item_id.unwrap_or_default(),
        user_id: payload.user_id.unwrap_or_default(),
        name: payload.name.unwrap_or_default(),
        email: payload.email.unwrap_or_default(),
        phone: payload.phone.unwrap_or_default(),
        comments: payload.comments.unwrap_or_default(),
        checkout_request_id: payload.checkout_request_id.unwrap_or_default(),
    };

    info!(
        lost_item_id = %submission.lost_item_id,
        user_id = %submission.user_id,
        "claim submission requested"
    );

    let claim = state.claims.submit(submission).await.map_err(attach)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitClaimResponse {
            message: "Claim submitted successfully".to_string(),
            status: claim.status,
            claim_id: claim.id,
        }),
    ))
}
