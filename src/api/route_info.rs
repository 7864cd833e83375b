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
use crate::models::ServiceRouteView;

#[derive(Debug, Deserialize, IntoParams)]
pub struct RouteInfoQuery {
    /// Service number, e.g. "15" or "CT18"
    pub service: Option<String>,
}

/// Stops along both directions of a service, with operators and terminals
#[utoipa::path(
    get,
    path = "/api/route-info",
    params(RouteInfoQuery),
    responses(
        (status = 200, description = "Route view; a missing direction has no stops and null terminals", body = ServiceRouteView),
        (status = 400, description = "Missing or malformed service", body = ErrorResponse),
        (status = 502, description = "Upstream fetch failed", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_info(
    State(state): State<AppState>,
    Query(query): Query<RouteInfoQuery>,
) -> Result<Response, ApiError> {
    let service = query
        .service
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Missing ?service=15"))?;
    if !is_service_param(service) {
        return Err(bad_request(format!("Invalid service number: {}", service)));
    }

    let view = state
        .gateway
        .route_info(service)
        .await
        .map_err(upstream_error)?;

    Ok((
        [(header::CACHE_CONTROL, state.cache.route_header())],
        Json(view),
    )
        .into_response())
}
