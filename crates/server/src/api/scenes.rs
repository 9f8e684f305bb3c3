use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use reelmatch_core::{LibraryError, Scene};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Get a stored scene by id
pub async fn get_scene(
    State(state): State<Arc<AppState>>,
    Path(scene_id): Path<String>,
) -> Result<Json<Scene>, ApiError> {
    match state.library().get_scene(&scene_id) {
        Ok(scene) => Ok(Json(scene)),
        Err(LibraryError::NotFound(_)) => {
            Err(api_error(404, format!("Scene not found: {}", scene_id)))
        }
        Err(e) => Err(api_error(500, e.to_string())),
    }
}
