//! HTTP route handlers for the dashboard API.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use monitor::core::snapshot::Snapshot;
use serde::Deserialize;
use tracing::warn;

use crate::state::AppState;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(get_snapshot))
        .route("/select/model", post(select_model))
        .route("/select/pair", post(select_pair))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /api/snapshot - the latest published snapshot.
async fn get_snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.snapshot())
}

#[derive(Debug, Deserialize)]
struct SelectModelRequest {
    model_id: String,
}

#[derive(Debug, Deserialize)]
struct SelectPairRequest {
    pair_index: usize,
}

/// POST /api/select/model - show another model on the selected pair.
async fn select_model(
    State(state): State<AppState>,
    Json(request): Json<SelectModelRequest>,
) -> Result<StatusCode, StatusCode> {
    if request.model_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    state
        .commands
        .select_model(request.model_id)
        .await
        .map_err(|e| {
            warn!(error = %e, "select model rejected");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/select/pair - show the selected model on another pair.
async fn select_pair(
    State(state): State<AppState>,
    Json(request): Json<SelectPairRequest>,
) -> Result<StatusCode, StatusCode> {
    let pairs = state.snapshot().progress.total_pairs.max(1);
    if request.pair_index >= pairs {
        return Err(StatusCode::BAD_REQUEST);
    }
    state
        .commands
        .select_pair(request.pair_index)
        .await
        .map_err(|e| {
            warn!(error = %e, "select pair rejected");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok(StatusCode::ACCEPTED)
}
