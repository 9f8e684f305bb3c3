use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, matching, middleware::metrics_middleware, scenes};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Matching
        .route("/match", post(matching::match_file))
        .route("/match/batch", post(matching::match_batch))
        .route("/match/batch/trigger", get(matching::trigger_batch))
        // Scenes
        .route("/scenes/{scene_id}", get(scenes::get_scene))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
