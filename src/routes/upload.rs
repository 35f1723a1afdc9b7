use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;

use crate::db::jobs::JobStore;
use crate::db::videos::VideoStore;
use crate::errors::ApiError;
use crate::models::job::{JobType, SampleJobPayload};
use crate::models::video::{UploadResponse, VideoStatus};
use crate::AppState;

const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm"];

/// All three effects of an upload (blob write, path update, job enqueue)
/// must be observable together or not at all: the response returns only
/// after the job is enqueued, and any failure in between is unwound below.
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .ok_or_else(|| ApiError::BadRequest("multipart field is missing a filename".to_string()))?
            .to_string();

        if !has_allowed_extension(&filename) {
            return Err(ApiError::BadRequest(format!(
                "unsupported file extension for {filename}"
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let video = VideoStore::create(state.db.pool(), &filename, "").await?;

        let tmp_path = state.config_tmp_path(&format!("{}_{}", video.id, filename));
        if let Err(e) = tokio::fs::write(&tmp_path, &data).await {
            fail_video(&state, video.id).await;
            // ENOSPC is the only disk-full signal `io::Error` exposes portably.
            return Err(if e.raw_os_error() == Some(28) {
                ApiError::StorageFull
            } else {
                ApiError::Internal(e.to_string())
            });
        }

        let key = format!("videos/{}/{}", video.id, filename);
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();
        let upload_result = state.storage.upload_bytes(&key, data.to_vec(), &content_type).await;
        let _ = tokio::fs::remove_file(&tmp_path).await;

        if let Err(e) = upload_result {
            // Object store unreachable: leave the row `queued` so the
            // upload can be retried without re-creating the video record.
            return Err(ApiError::UpstreamUnavailable(e.to_string()));
        }

        if let Err(e) = sqlx::query("UPDATE videos SET path = $2 WHERE id = $1")
            .bind(video.id)
            .bind(&key)
            .execute(state.db.pool())
            .await
        {
            fail_video(&state, video.id).await;
            return Err(e.into());
        }

        if let Err(e) = JobStore::enqueue(
            state.db.pool(),
            video.id,
            JobType::Sample,
            serde_json::to_value(SampleJobPayload {
                video_id: video.id,
                filename: filename.clone(),
            })
            .expect("payload serializes"),
        )
        .await
        {
            fail_video(&state, video.id).await;
            return Err(e.into());
        }

        return Ok((
            StatusCode::ACCEPTED,
            Json(UploadResponse {
                video_id: video.id,
                filename,
                status: video.status,
            }),
        ));
    }

    Err(ApiError::BadRequest(
        "multipart body did not contain a `file` field".to_string(),
    ))
}

/// Best-effort status flip to `failed` after a mid-ingress error. Errors
/// here are logged, not propagated — the caller already has the error that
/// matters and a failed status update shouldn't mask it.
async fn fail_video(state: &Arc<AppState>, video_id: uuid::Uuid) {
    if let Err(e) = VideoStore::set_status(state.db.pool(), video_id, VideoStatus::Failed).await {
        tracing::warn!(%video_id, error = %e, "failed to mark video failed after ingress error");
    }
}

fn has_allowed_extension(filename: &str) -> bool {
    filename
        .rsplit('.')
        .next()
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
