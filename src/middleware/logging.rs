//! Request identification and logging middleware

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::info;
use uuid::Uuid;

/// Generates a UUIDv4 request id for `SetRequestIdLayer`.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Logs every request with its id, method, path, status and latency.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis();

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = latency_ms as u64,
        "request completed"
    );

    response
}
