use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::{AppState, ErrorResponse, bad_request, is_service_param, upstream_error};
use crate::api::error::ApiError;
use crate::models::{ArrivalsView, is_stop_code};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ArrivalsQuery {
    /// 5-digit bus stop code
    pub stop: Option<String>,
    /// Only return this service number
    pub service: Option<String>,
}

/// Live arrivals at a bus stop
#[utoipa::path(
    get,
    path = "/api/arrivals",
    params(ArrivalsQuery),
    responses(
        (status = 200, description = "Normalized arrivals, services in upstream order", body = ArrivalsView),
        (status = 400, description = "Missing or malformed stop code or service", body = ErrorResponse),
        (status = 502, description = "Upstream fetch failed", body = ErrorResponse)
    ),
    tag = "arrivals"
)]
pub async fn get_arrivals(
    State(state): State<AppState>,
    Query(query): Query<ArrivalsQuery>,
) -> Result<Response, ApiError> {
    let stop = query
        .stop
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Missing ?stop=BUS_STOP_CODE"))?;
    if !is_stop_code(stop) {
        return Err(bad_request(format!("Invalid bus stop code: {}", stop)));
    }

    let service = query
        .service
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(service) = service {
        if !is_service_param(service) {
            return Err(bad_request(format!("Invalid service number: {}", service)));
        }
    }

    let view = state
        .load_arrivals(stop, service)
        .await
        .map_err(upstream_error)?;

    tracing::debug!(
        stop = %view.stop_code,
        services = view.services.len(),
        "Returning arrivals"
    );

    Ok((
        [(header::CACHE_CONTROL, state.cache.arrivals_header())],
        Json(view),
    )
        .into_response())
}
