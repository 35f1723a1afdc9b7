use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::jobs::{backoff_delay, JobStore};
use crate::db::ocr_frames::OcrFrameStore;
use crate::db::videos::VideoStore;
use crate::errors::pipeline::PipelineError;
use crate::models::job::{JobType, OcrJobPayload};
use crate::models::video::VideoStatus;
use crate::workers::{wait_or_shutdown, ShutdownRx};
use crate::AppState;

/// Polls for `ocr` jobs: downloads the greyscaled frame, runs the
/// conditioning + Tesseract pipeline, upserts the result keyed by object
/// key, and marks the parent video `ready` once every frame has a
/// processed OCR row.
///
/// The shutdown signal is only checked between iterations of this loop,
/// never inside `process`, so a job already claimed always runs to
/// completion (ack or nack) before the worker exits.
pub async fn run(state: Arc<AppState>, mut shutdown: ShutdownRx) {
    info!("ocr worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        match JobStore::claim(state.db.pool(), JobType::Ocr).await {
            Ok(Some(job)) => {
                let attempt = job.retry_count as u32;
                if let Err(e) = process(&state, job.video_id, job.payload.clone()).await {
                    warn!(job_id = %job.id, error = %e, "ocr job failed");
                    if let Err(nack_err) =
                        JobStore::nack(state.db.pool(), job.id, &e, state.config.job_max_retries).await
                    {
                        error!(job_id = %job.id, error = %nack_err, "failed to record ocr job failure");
                    }
                    sleep(backoff_delay(state.config.job_retry_base_delay, attempt)).await;
                } else if let Err(e) = JobStore::ack(state.db.pool(), job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to ack ocr job");
                }
            }
            Ok(None) => wait_or_shutdown(&mut shutdown, state.config.job_poll_interval).await,
            Err(e) => {
                error!(error = %e, "error claiming ocr job");
                wait_or_shutdown(&mut shutdown, state.config.job_poll_interval).await;
            }
        }
    }
    info!("ocr worker stopped");
}

async fn process(
    state: &Arc<AppState>,
    video_id: Uuid,
    payload: serde_json::Value,
) -> Result<(), PipelineError> {
    let payload: OcrJobPayload = serde_json::from_value(payload)
        .map_err(|e| PipelineError::Invariant(format!("malformed ocr job payload: {e}")))?;

    let bytes = state.storage.download_bytes(&payload.frame_s3_key).await?;

    let tmp_path = state.config_tmp_path(&format!("ocr_{}.jpg", uuid::Uuid::new_v4()));
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| PipelineError::Transient(e.to_string()))?;

    let config = state.config.clone();
    let tmp_path_clone = tmp_path.clone();
    let text = tokio::task::spawn_blocking(move || crate::ocr::run_ocr(&tmp_path_clone, &config))
        .await
        .map_err(|e| PipelineError::Engine(format!("ocr task panicked: {e}")))??;

    let _ = tokio::fs::remove_file(&tmp_path).await;

    OcrFrameStore::upsert(state.db.pool(), video_id, &payload.frame_s3_key, &text).await?;
    info!(%video_id, key = %payload.frame_s3_key, chars = text.len(), "ocr processed");

    maybe_mark_ready(state, video_id).await?;

    Ok(())
}

/// Marks a video `ready` the moment every one of its frames has a
/// processed OCR row — checked on every completion rather than via a
/// stored counter, so a frame added after the fact (self-heal orphan
/// repair, manual insert) is never silently skipped.
async fn maybe_mark_ready(state: &Arc<AppState>, video_id: Uuid) -> Result<(), PipelineError> {
    let (total, done) = VideoStore::ocr_progress(state.db.pool(), video_id).await?;

    if total > 0 && done >= total {
        VideoStore::set_status(state.db.pool(), video_id, VideoStatus::Ready).await?;
        info!(%video_id, frames = total, "video marked ready");
    }

    Ok(())
}
