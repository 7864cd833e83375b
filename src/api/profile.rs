use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::{AppState, ErrorResponse, internal_error};
use crate::api::error::ApiError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub name: String,
    /// e.g. "Good Evening, Ana!"
    pub greeting: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub name: String,
}

async fn profile_response(state: &AppState) -> ProfileResponse {
    ProfileResponse {
        name: state.profile.name().await,
        greeting: state.profile.message_at(Utc::now()).await,
    }
}

/// Greeting name and time-of-day greeting
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Current greeting", body = ProfileResponse)
    ),
    tag = "profile"
)]
pub async fn get_profile(State(state): State<AppState>) -> Json<ProfileResponse> {
    Json(profile_response(&state).await)
}

/// Set the greeting name; blank clears it
#[utoipa::path(
    put,
    path = "/api/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated greeting", body = ProfileResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "profile"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    state
        .profile
        .set_name(&update.name)
        .await
        .map_err(internal_error)?;
    Ok(Json(profile_response(&state).await))
}
