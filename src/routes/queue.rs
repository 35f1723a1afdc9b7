use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;

use crate::db::jobs::JobStore;
use crate::errors::ApiError;
use crate::models::job::QueueStats;
use crate::AppState;

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Vec<QueueStats>>, ApiError> {
    let stats = JobStore::stats(state.db.pool()).await?;
    Ok(Json(stats))
}
