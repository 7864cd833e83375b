use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::{AppState, ErrorResponse, bad_request, not_found, upstream_error};
use crate::api::error::ApiError;
use crate::models::{StopRecord, is_stop_code};
use crate::stops::IndexStatus;
use crate::stops::search::{self, MAX_MATCHES};

#[derive(Debug, Deserialize, IntoParams)]
pub struct StopSearchQuery {
    /// Stop name fragment, or leading digits of a stop code
    pub q: Option<String>,
    /// At most 20
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopSearchResponse {
    pub stops: Vec<StopRecord>,
    pub index_status: IndexStatus,
}

/// Autocomplete bus stops, in dataset order
#[utoipa::path(
    get,
    path = "/api/stops/search",
    params(StopSearchQuery),
    responses(
        (status = 200, description = "Matching stops; empty while the stop index is unavailable", body = StopSearchResponse)
    ),
    tag = "stops"
)]
pub async fn search_stops(
    State(state): State<AppState>,
    Query(query): Query<StopSearchQuery>,
) -> Json<StopSearchResponse> {
    let index = state.stop_index.load().await;
    let limit = query.limit.unwrap_or(MAX_MATCHES);
    let stops = search::matches(&index, query.q.as_deref().unwrap_or_default(), limit)
        .into_iter()
        .cloned()
        .collect();

    Json(StopSearchResponse {
        stops,
        index_status: state.stop_index.status().await,
    })
}

/// Look up a single stop by code
#[utoipa::path(
    get,
    path = "/api/stops/{code}",
    params(
        ("code" = String, Path, description = "5-digit bus stop code")
    ),
    responses(
        (status = 200, description = "Stop record", body = StopRecord),
        (status = 400, description = "Malformed stop code", body = ErrorResponse),
        (status = 404, description = "Stop not in the index", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn get_stop(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StopRecord>, ApiError> {
    if !is_stop_code(&code) {
        return Err(bad_request(format!("Invalid bus stop code: {}", code)));
    }

    state
        .stop_index
        .lookup(&code)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Bus stop not found"))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopRefreshResponse {
    pub count: usize,
}

/// Re-download the stop dataset and replace the cached index
#[utoipa::path(
    post,
    path = "/api/stops/refresh",
    responses(
        (status = 200, description = "Index reloaded", body = StopRefreshResponse),
        (status = 502, description = "Dataset fetch failed; previous index kept", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn refresh_stops(
    State(state): State<AppState>,
) -> Result<Json<StopRefreshResponse>, ApiError> {
    let index = state.stop_index.refresh().await.map_err(upstream_error)?;
    Ok(Json(StopRefreshResponse { count: index.len() }))
}
