use axum::{
    extract::{Query, State},
    Json,
};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::api::{AppState, ErrorResponse, bad_request, conflict};
use crate::api::error::ApiError;
use crate::board::{self, BoardError, BoardSnapshot, BoardUpdate};
use crate::models::ArrivalsView;
use crate::providers::ProviderError;
use crate::query::ViewFragment;

/// Arrivals loader handed to the board
fn fetcher(
    state: &AppState,
) -> impl FnOnce(ViewFragment) -> BoxFuture<'static, Result<ArrivalsView, ProviderError>> {
    let state = state.clone();
    move |target: ViewFragment| {
        async move {
            state
                .load_arrivals(&target.stop_code, target.service.as_deref())
                .await
        }
        .boxed()
    }
}

fn into_response(update: BoardUpdate) -> Result<Json<BoardSnapshot>, ApiError> {
    match update {
        BoardUpdate::Applied(snapshot) => Ok(Json(snapshot)),
        BoardUpdate::Stale { request_id } => Err(conflict(format!(
            "Request {} was superseded by a newer one",
            request_id
        ))),
    }
}

fn board_error(err: BoardError) -> ApiError {
    bad_request(err.to_string())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BoardQuery {
    /// Stop code, "<code> <service>", or part of a stop name
    pub query: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BoardInitQuery {
    /// `<stop>` or `<stop>,<service>`, with or without the leading '#'
    pub fragment: Option<String>,
}

/// The stop currently shown and its last loaded arrivals
#[utoipa::path(
    get,
    path = "/api/board",
    responses(
        (status = 200, description = "Current board", body = BoardSnapshot)
    ),
    tag = "board"
)]
pub async fn get_board(State(state): State<AppState>) -> Json<BoardSnapshot> {
    Json(state.board.snapshot().await)
}

/// Show a stop from a search box entry
#[utoipa::path(
    post,
    path = "/api/board",
    request_body = BoardQuery,
    responses(
        (status = 200, description = "Board after loading; `error` is set when arrivals could not be loaded", body = BoardSnapshot),
        (status = 400, description = "No stop matches the query", body = ErrorResponse),
        (status = 409, description = "Superseded by a newer request", body = ErrorResponse)
    ),
    tag = "board"
)]
pub async fn show_board(
    State(state): State<AppState>,
    Json(body): Json<BoardQuery>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let index = state.stop_index.load().await;
    let target = board::resolve(&body.query, &index).map_err(board_error)?;
    into_response(state.board.show_with(target, fetcher(&state)).await)
}

/// Reload the stop currently shown
#[utoipa::path(
    post,
    path = "/api/board/refresh",
    responses(
        (status = 200, description = "Reloaded board", body = BoardSnapshot),
        (status = 400, description = "Nothing shown yet", body = ErrorResponse),
        (status = 409, description = "Superseded by a newer request", body = ErrorResponse)
    ),
    tag = "board"
)]
pub async fn refresh_board(State(state): State<AppState>) -> Result<Json<BoardSnapshot>, ApiError> {
    let update = state
        .board
        .refresh_with(fetcher(&state))
        .await
        .map_err(board_error)?;
    into_response(update)
}

/// Reload the current stop, or the first favourite when nothing is shown;
/// rejected while there are no favourites
#[utoipa::path(
    post,
    path = "/api/board/refresh-all",
    responses(
        (status = 200, description = "Reloaded board", body = BoardSnapshot),
        (status = 400, description = "No favourites", body = ErrorResponse),
        (status = 409, description = "Superseded by a newer request", body = ErrorResponse)
    ),
    tag = "board"
)]
pub async fn refresh_all_board(
    State(state): State<AppState>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let first = state.favourites.first().await;
    let update = state
        .board
        .refresh_all_with(first, fetcher(&state))
        .await
        .map_err(board_error)?;
    into_response(update)
}

/// Initial view from a link fragment, else the first favourite
#[utoipa::path(
    get,
    path = "/api/board/init",
    params(BoardInitQuery),
    responses(
        (status = 200, description = "Initial board; empty when there is nothing to show", body = BoardSnapshot),
        (status = 409, description = "Superseded by a newer request", body = ErrorResponse)
    ),
    tag = "board"
)]
pub async fn init_board(
    State(state): State<AppState>,
    Query(query): Query<BoardInitQuery>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let first = state.favourites.first().await;
    let update = state
        .board
        .initial_with(query.fragment.as_deref(), first, fetcher(&state))
        .await;
    into_response(update)
}
