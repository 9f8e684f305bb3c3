//! Match API handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, info};
use reelmatch_core::{BatchRequest, BatchResult, MatchRequest, MatchResult};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
}

/// Match a single file
pub async fn match_file(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchResult>, ApiError> {
    let Json(request) = body.map_err(|e| api_error(400, e.body_text()))?;

    match state
        .orchestrator()
        .match_file(request.file_id, request.dry_run)
        .await
    {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            if e.status_code() >= 500 {
                error!("Match for file {} failed: {}", request.file_id, e);
            }
            Err(api_error(e.status_code(), e.to_string()))
        }
    }
}

/// Match a batch of unlinked files and wait for the outcome
pub async fn match_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResult>, ApiError> {
    let Json(request) = body.map_err(|e| api_error(400, e.body_text()))?;

    state
        .scheduler()
        .run_batch(request)
        .await
        .map(Json)
        .map_err(|e| api_error(e.status_code(), e.to_string()))
}

/// Start a batch in the background and return immediately
pub async fn trigger_batch(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BatchRequest>, axum::extract::rejection::QueryRejection>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let Query(request) = query.map_err(|e| api_error(400, e.body_text()))?;

    if state.scheduler().trigger(request) {
        info!("Batch match triggered");
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".to_string(),
        }),
    ))
}
