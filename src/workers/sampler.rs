use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::jobs::{backoff_delay, JobStore};
use crate::db::frames::FrameStore;
use crate::errors::pipeline::PipelineError;
use crate::models::job::{GreyscaleJobPayload, JobType, SampleJobPayload};
use crate::models::video::VideoStatus;
use crate::scene::{deduplicate_by_histogram, extract_scene_frames, DetectedFrame};
use crate::workers::{wait_or_shutdown, ShutdownRx};
use crate::AppState;

/// Polls for `sample` jobs: downloads the source video, extracts scene
/// cuts via ffmpeg, deduplicates near-identical frames, uploads the
/// survivors, and queues one `greyscale` job per uploaded frame.
///
/// The shutdown signal is only checked between iterations of this loop,
/// never inside `process`, so a job already claimed always runs to
/// completion (ack or nack) before the worker exits.
pub async fn run(state: Arc<AppState>, mut shutdown: ShutdownRx) {
    info!("sampler worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        match JobStore::claim(state.db.pool(), JobType::Sample).await {
            Ok(Some(job)) => {
                let attempt = job.retry_count as u32;
                if let Err(e) = process(&state, job.id, job.video_id, job.payload.clone()).await {
                    warn!(job_id = %job.id, error = %e, "sample job failed");
                    if let Err(nack_err) =
                        JobStore::nack(state.db.pool(), job.id, &e, state.config.job_max_retries).await
                    {
                        error!(job_id = %job.id, error = %nack_err, "failed to record sample job failure");
                    }
                    sleep(backoff_delay(state.config.job_retry_base_delay, attempt)).await;
                } else if let Err(e) = JobStore::ack(state.db.pool(), job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to ack sample job");
                }
            }
            Ok(None) => wait_or_shutdown(&mut shutdown, state.config.job_poll_interval).await,
            Err(e) => {
                error!(error = %e, "error claiming sample job");
                wait_or_shutdown(&mut shutdown, state.config.job_poll_interval).await;
            }
        }
    }
    info!("sampler worker stopped");
}

async fn process(
    state: &Arc<AppState>,
    job_id: Uuid,
    video_id: Uuid,
    payload: serde_json::Value,
) -> Result<(), PipelineError> {
    let payload: SampleJobPayload = serde_json::from_value(payload)
        .map_err(|e| PipelineError::Invariant(format!("malformed sample job payload: {e}")))?;

    let video = crate::db::videos::VideoStore::get(state.db.pool(), video_id)
        .await?
        .ok_or_else(|| PipelineError::Invariant(format!("video {video_id} missing for job {job_id}")))?;

    let local_video = state.config_tmp_path(&format!("{video_id}.mp4"));
    let bytes = state.storage.download_bytes(&video.path).await?;
    tokio::fs::write(&local_video, &bytes)
        .await
        .map_err(|e| PipelineError::Transient(e.to_string()))?;

    let out_dir = state.config_tmp_path(&format!("samples_{video_id}"));
    let detected = extract_scene_frames(&local_video, &out_dir, state.config.sample_threshold).await?;

    if detected.is_empty() {
        warn!(%video_id, "no keyframes extracted from video");
        let _ = tokio::fs::remove_file(&local_video).await;
        let _ = tokio::fs::remove_dir_all(&out_dir).await;
        return Ok(());
    }

    let with_gray = load_grayscale(detected)?;
    let kept = deduplicate_by_histogram(with_gray, state.config.dedup_correlation_threshold);
    info!(%video_id, kept = kept.len(), "sampled frames after dedup");

    let base_prefix = format!("videos/{video_id}/samples");
    for (idx, frame) in kept.into_iter().enumerate() {
        let frame_number = (idx + 1) as i32;
        let key = format!("{base_prefix}/frame_{frame_number:04}.jpg");

        if let Err(e) = upload_one_frame(state, video_id, frame_number, &key, &frame).await {
            warn!(%video_id, frame_number, error = %e, "skipping frame after upload/enqueue failure");
            continue;
        }
    }

    crate::db::videos::VideoStore::set_status(state.db.pool(), video_id, VideoStatus::Processing).await?;

    let _ = tokio::fs::remove_file(&local_video).await;
    let _ = tokio::fs::remove_dir_all(&out_dir).await;
    let _ = payload; // filename carried for traceability only, video row is authoritative

    Ok(())
}

/// Uploads, records, and enqueues follow-up work for a single sampled
/// frame. Kept as one fallible unit so a failure partway through (upload
/// ok, enqueue fails) doesn't leave the frame row or the job queue in a
/// state the caller can't just skip and move on from.
async fn upload_one_frame(
    state: &Arc<AppState>,
    video_id: Uuid,
    frame_number: i32,
    key: &str,
    frame: &DetectedFrame,
) -> Result<(), PipelineError> {
    let bytes = tokio::fs::read(&frame.path)
        .await
        .map_err(|e| PipelineError::Transient(e.to_string()))?;
    state.storage.upload_bytes(key, bytes, "image/jpeg").await?;

    FrameStore::insert(state.db.pool(), video_id, frame_number, frame.frame_time, key).await?;

    JobStore::enqueue(
        state.db.pool(),
        video_id,
        JobType::Greyscale,
        serde_json::to_value(GreyscaleJobPayload {
            video_id,
            frame_number,
            frame_s3_key: key.to_string(),
        })
        .expect("payload serializes"),
    )
    .await?;

    Ok(())
}

fn load_grayscale(
    frames: Vec<DetectedFrame>,
) -> Result<Vec<(DetectedFrame, image::GrayImage)>, PipelineError> {
    frames
        .into_iter()
        .map(|frame| {
            let img = image::open(&frame.path)
                .map_err(|e| PipelineError::BadInput(format!("unreadable sampled frame: {e}")))?
                .to_luma8();
            Ok((frame, img))
        })
        .collect()
}
