use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::frames::FrameStore;
use crate::db::jobs::{backoff_delay, JobStore};
use crate::errors::pipeline::PipelineError;
use crate::models::job::{GreyscaleJobPayload, JobType, OcrJobPayload};
use crate::workers::{wait_or_shutdown, ShutdownRx};
use crate::AppState;

/// Polls for `greyscale` jobs: downloads the sampled frame, converts it
/// to grayscale, re-uploads under `/greyscaled/`, and queues the
/// corresponding `ocr` job.
///
/// The shutdown signal is only checked between iterations of this loop,
/// never inside `process`, so a job already claimed always runs to
/// completion (ack or nack) before the worker exits.
pub async fn run(state: Arc<AppState>, mut shutdown: ShutdownRx) {
    info!("preprocessor worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        match JobStore::claim(state.db.pool(), JobType::Greyscale).await {
            Ok(Some(job)) => {
                let attempt = job.retry_count as u32;
                if let Err(e) = process(&state, job.video_id, job.payload.clone()).await {
                    warn!(job_id = %job.id, error = %e, "greyscale job failed");
                    if let Err(nack_err) =
                        JobStore::nack(state.db.pool(), job.id, &e, state.config.job_max_retries).await
                    {
                        error!(job_id = %job.id, error = %nack_err, "failed to record greyscale job failure");
                    }
                    sleep(backoff_delay(state.config.job_retry_base_delay, attempt)).await;
                } else if let Err(e) = JobStore::ack(state.db.pool(), job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to ack greyscale job");
                }
            }
            Ok(None) => wait_or_shutdown(&mut shutdown, state.config.job_poll_interval).await,
            Err(e) => {
                error!(error = %e, "error claiming greyscale job");
                wait_or_shutdown(&mut shutdown, state.config.job_poll_interval).await;
            }
        }
    }
    info!("preprocessor worker stopped");
}

async fn process(
    state: &Arc<AppState>,
    video_id: Uuid,
    payload: serde_json::Value,
) -> Result<(), PipelineError> {
    let payload: GreyscaleJobPayload = serde_json::from_value(payload)
        .map_err(|e| PipelineError::Invariant(format!("malformed greyscale job payload: {e}")))?;

    let bytes = state.storage.download_bytes(&payload.frame_s3_key).await?;

    let img = image::load_from_memory(&bytes)
        .map_err(|e| PipelineError::BadInput(format!("unreadable frame image: {e}")))?
        .to_luma8();

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg)
        .map_err(|e| PipelineError::Engine(format!("failed to encode greyscale frame: {e}")))?;

    let grey_key = payload.frame_s3_key.replacen("/samples/", "/greyscaled/", 1);
    state
        .storage
        .upload_bytes(&grey_key, buf.into_inner(), "image/jpeg")
        .await?;

    let frame = FrameStore::find_by_number(state.db.pool(), video_id, payload.frame_number)
        .await?
        .ok_or_else(|| {
            PipelineError::Invariant(format!(
                "frame record missing for video {video_id} frame {}",
                payload.frame_number
            ))
        })?;
    FrameStore::mark_greyscaled(state.db.pool(), frame.id).await?;

    JobStore::enqueue(
        state.db.pool(),
        video_id,
        JobType::Ocr,
        serde_json::to_value(OcrJobPayload {
            video_id,
            frame_s3_key: grey_key,
        })
        .expect("payload serializes"),
    )
    .await?;

    Ok(())
}
