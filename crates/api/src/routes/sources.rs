//! Per-source run status endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::response::{ApiError, SourcesResponse};
use crate::state::AppState;
use worker::SourceStatus;

/// GET /sources - Last run of every configured source.
pub async fn list_handler(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.status.snapshot(),
    })
}

/// GET /sources/:id - Last run of one source.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SourceStatus>, ApiError> {
    state
        .status
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("unknown source: {}", id)))
}
