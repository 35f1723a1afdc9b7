use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::frames::FrameStore;
use crate::db::videos::VideoStore;
use crate::errors::ApiError;
use crate::models::frame::FramesResponse;
use crate::models::video::{CatalogSummary, VideoDetail, VideoListResponse};
use crate::AppState;

/// Presign TTLs are clamped to this range regardless of what the caller
/// asks for: long enough to be useful, short enough that a leaked link
/// doesn't stay valid forever.
pub(crate) const MIN_PRESIGN_TTL_SECS: i64 = 60;
pub(crate) const MAX_PRESIGN_TTL_SECS: i64 = 86_400;

fn clamped_ttl(requested: Option<i64>, default: i64) -> Duration {
    let secs = requested.unwrap_or(default).clamp(MIN_PRESIGN_TTL_SECS, MAX_PRESIGN_TTL_SECS);
    Duration::from_secs(secs as u64)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub expires_in: Option<i64>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct FramesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub expires_in: Option<i64>,
}

fn default_limit() -> i64 {
    20
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<VideoListResponse>, ApiError> {
    let items = VideoStore::list_summaries(state.db.pool(), query.page, query.page_size).await?;
    Ok(Json(VideoListResponse { items }))
}

pub async fn get_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<VideoDetail>, ApiError> {
    let summary = VideoStore::get_summary(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let video = VideoStore::get(state.db.pool(), id).await?.ok_or(ApiError::NotFound)?;
    let ttl = clamped_ttl(query.expires_in, state.config.default_presign_ttl_secs);
    let source_url = state.storage.presign_get(&video.path, ttl).await.ok();

    Ok(Json(VideoDetail { summary, source_url }))
}

pub async fn list_frames(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<FramesQuery>,
) -> Result<Json<FramesResponse>, ApiError> {
    let mut items = FrameStore::list_for_video(state.db.pool(), id, query.limit, query.offset).await?;

    let ttl = clamped_ttl(query.expires_in, state.config.default_presign_ttl_secs);
    for frame in items.iter_mut() {
        frame.presigned_url = state.storage.presign_get(&frame.path, ttl).await.ok();
    }

    Ok(Json(FramesResponse {
        items,
        limit: query.limit,
        offset: query.offset,
    }))
}

pub async fn catalog_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CatalogSummary>, ApiError> {
    let summary = VideoStore::catalog_summary(state.db.pool()).await?;
    Ok(Json(summary))
}
