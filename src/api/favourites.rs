use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::{AppState, ErrorResponse, bad_request, internal_error};
use crate::api::error::ApiError;
use crate::models::is_stop_code;

#[derive(Debug, Serialize, ToSchema)]
pub struct Favourite {
    pub code: String,
    /// Null when the stop is not in the index
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavouriteListResponse {
    pub favourites: Vec<Favourite>,
    pub count: usize,
}

async fn favourite_list(state: &AppState) -> FavouriteListResponse {
    let codes = state.favourites.list().await;
    let index = state.stop_index.load().await;
    let favourites: Vec<Favourite> = codes
        .into_iter()
        .map(|code| Favourite {
            name: index.name_of(&code).map(str::to_string),
            code,
        })
        .collect();
    let count = favourites.len();
    FavouriteListResponse { favourites, count }
}

/// List favourite stops in the order they were added
#[utoipa::path(
    get,
    path = "/api/favourites",
    responses(
        (status = 200, description = "Favourite stops", body = FavouriteListResponse)
    ),
    tag = "favourites"
)]
pub async fn list_favourites(State(state): State<AppState>) -> Json<FavouriteListResponse> {
    Json(favourite_list(&state).await)
}

/// Append a stop to the favourites; adding an existing one changes nothing
#[utoipa::path(
    post,
    path = "/api/favourites/{code}",
    params(
        ("code" = String, Path, description = "5-digit bus stop code")
    ),
    responses(
        (status = 200, description = "Updated favourites", body = FavouriteListResponse),
        (status = 400, description = "Malformed stop code", body = ErrorResponse)
    ),
    tag = "favourites"
)]
pub async fn add_favourite(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<FavouriteListResponse>, ApiError> {
    if !is_stop_code(&code) {
        return Err(bad_request(format!("Invalid bus stop code: {}", code)));
    }
    state.favourites.add(&code).await.map_err(internal_error)?;
    Ok(Json(favourite_list(&state).await))
}

/// Remove a stop from the favourites; removing a non-member changes nothing
#[utoipa::path(
    delete,
    path = "/api/favourites/{code}",
    params(
        ("code" = String, Path, description = "5-digit bus stop code")
    ),
    responses(
        (status = 200, description = "Updated favourites", body = FavouriteListResponse)
    ),
    tag = "favourites"
)]
pub async fn remove_favourite(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<FavouriteListResponse>, ApiError> {
    state.favourites.remove(&code).await.map_err(internal_error)?;
    Ok(Json(favourite_list(&state).await))
}
