use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Json;

use crate::db::search as search_db;
use crate::errors::ApiError;
use crate::models::search::{SearchQuery, SearchResponse};
use crate::routes::videos::{MAX_PRESIGN_TTL_SECS, MIN_PRESIGN_TTL_SECS};
use crate::AppState;

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest("query parameter `q` must not be empty".to_string()));
    }

    let mut response = search_db::search(state.db.pool(), &query.q, query.page, query.page_size).await?;

    let ttl_secs = query
        .expires_in
        .unwrap_or(state.config.default_presign_ttl_secs)
        .clamp(MIN_PRESIGN_TTL_SECS, MAX_PRESIGN_TTL_SECS);
    let ttl = Duration::from_secs(ttl_secs as u64);
    for hit in response.items.iter_mut() {
        hit.presigned_url = state.storage.presign_get(&hit.frame_key, ttl).await.ok();
    }

    Ok(Json(response))
}
