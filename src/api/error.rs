use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::providers::ProviderError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn respond(status: StatusCode, error: impl Into<String>, detail: Option<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            detail,
        }),
    )
}

/// Malformed or missing request parameter; not retried
pub fn bad_request(message: impl Into<String>) -> ApiError {
    respond(StatusCode::BAD_REQUEST, message, None)
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    respond(StatusCode::NOT_FOUND, message, None)
}

pub fn conflict(message: impl Into<String>) -> ApiError {
    respond(StatusCode::CONFLICT, message, None)
}

/// Upstream fetch or decode failure, reported as a gateway error
pub fn upstream_error(err: ProviderError) -> ApiError {
    warn!(error = %err, "Upstream fetch failed");
    respond(
        StatusCode::BAD_GATEWAY,
        "Upstream fetch failed",
        Some(err.to_string()),
    )
}

/// Helper to log error and return generic internal server error
pub fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!("Internal error: {}", err);
    respond(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
}
