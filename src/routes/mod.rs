pub mod health;
pub mod queue;
pub mod search;
pub mod upload;
pub mod videos;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = (state.config.max_upload_size_mb * 1024 * 1024) as usize;

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/queue/stats", get(queue::stats))
        .route("/api/upload", post(upload::upload_video))
        .route("/api/videos", get(videos::list))
        .route("/api/videos/:id", get(videos::get_detail))
        .route("/api/videos/:id/frames", get(videos::list_frames))
        .route("/api/search", get(search::search))
        .route("/api/summary", get(videos::catalog_summary))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
