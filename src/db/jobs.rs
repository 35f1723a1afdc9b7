use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::pipeline::PipelineError;
use crate::models::job::{Job, JobErrorEntry, JobStatus, JobType, QueueStats};

/// Job queue backed by a plain Postgres table rather than a broker.
///
/// Claiming is a transactional select-then-update: `FOR UPDATE SKIP
/// LOCKED` lets N workers poll the same table concurrently without
/// blocking each other on rows some other worker already has a lock on,
/// and the guarded `UPDATE ... WHERE status = 'queued'` plus an
/// affected-rows check catches the rare case where another worker claimed
/// the same row between the select and the update of this transaction —
/// in that case this worker just loses the race and tries the next
/// candidate instead of claiming twice.
pub struct JobStore;

impl JobStore {
    pub async fn enqueue(
        pool: &PgPool,
        video_id: Uuid,
        job_type: JobType,
        payload: serde_json::Value,
    ) -> Result<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, video_id, job_type, status, retry_count, payload, created_at, updated_at)
            VALUES ($1, $2, $3, 'queued', 0, $4, now(), now())
            RETURNING id, video_id, job_type, status, retry_count, payload, created_at, started_at, finished_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(video_id)
        .bind(job_type)
        .bind(payload)
        .fetch_one(pool)
        .await?;

        Ok(job)
    }

    /// Leases the oldest queued job of the given type, skipping rows
    /// another worker already holds a row lock on. Returns `None` if
    /// nothing is available right now; callers poll again after their
    /// configured interval.
    pub async fn claim(pool: &PgPool, job_type: JobType) -> Result<Option<Job>> {
        let mut tx = pool.begin().await?;

        let candidate = sqlx::query_as::<_, Job>(
            r#"
            SELECT id, video_id, job_type, status, retry_count, payload, created_at, started_at, finished_at, updated_at
            FROM jobs
            WHERE job_type = $1 AND status = 'queued'
            ORDER BY created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .bind(job_type)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(candidate) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'processing', started_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'queued'
            "#,
        )
        .bind(candidate.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            // Lost the race to another worker between select and update; try again next poll.
            return Ok(None);
        }

        Ok(Some(Job {
            status: JobStatus::Processing,
            ..candidate
        }))
    }

    pub async fn ack(pool: &PgPool, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs SET status = 'done', finished_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Requeues a failed attempt, or moves the job to `failed` once the
    /// retry budget or a fatal error kind says to stop. Appends to the
    /// payload's `errors` array rather than overwriting it, so the full
    /// attempt history survives to the terminal state.
    pub async fn nack(
        pool: &PgPool,
        job_id: Uuid,
        error: &PipelineError,
        max_retries: i32,
    ) -> Result<()> {
        let row: (i32, serde_json::Value) =
            sqlx::query_as("SELECT retry_count, payload FROM jobs WHERE id = $1")
                .bind(job_id)
                .fetch_one(pool)
                .await?;
        let (retry_count, mut payload) = row;

        let entry = JobErrorEntry {
            at: Utc::now(),
            message: error.to_string(),
            attempt: retry_count + 1,
        };
        append_error(&mut payload, &entry)?;

        let next_retry_count = retry_count + 1;
        let give_up = error.is_fatal() || next_retry_count >= max_retries;
        let next_status = if give_up { "failed" } else { "queued" };

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, retry_count = $3, payload = $4, updated_at = now(),
                finished_at = CASE WHEN $2 = 'failed' THEN now() ELSE finished_at END
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(next_status)
        .bind(next_retry_count)
        .bind(payload)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn stats(pool: &PgPool) -> Result<Vec<QueueStats>> {
        let rows: Vec<(JobType, String, i64)> = sqlx::query_as(
            r#"
            SELECT job_type, status, count(*) as count
            FROM jobs
            GROUP BY job_type, status
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut by_type: std::collections::BTreeMap<&'static str, QueueStats> =
            std::collections::BTreeMap::new();

        for job_type in [JobType::Sample, JobType::Greyscale, JobType::Ocr] {
            by_type.insert(
                job_type.as_str(),
                QueueStats {
                    job_type,
                    queued: 0,
                    processing: 0,
                    done: 0,
                    failed: 0,
                },
            );
        }

        for (job_type, status, count) in rows {
            if let Some(stats) = by_type.get_mut(job_type.as_str()) {
                match status.as_str() {
                    "queued" => stats.queued = count,
                    "processing" => stats.processing = count,
                    "done" => stats.done = count,
                    "failed" => stats.failed = count,
                    _ => {}
                }
            }
        }

        Ok(by_type.into_values().collect())
    }
}

fn append_error(payload: &mut serde_json::Value, entry: &JobErrorEntry) -> Result<()> {
    if !payload.is_object() {
        *payload = serde_json::json!({});
    }
    let obj = payload.as_object_mut().expect("just ensured object");
    let errors = obj
        .entry("errors")
        .or_insert_with(|| serde_json::json!([]));
    if !errors.is_array() {
        *errors = serde_json::json!([]);
    }
    errors
        .as_array_mut()
        .expect("just ensured array")
        .push(serde_json::to_value(entry)?);
    Ok(())
}

/// Exponential backoff with jitter: `base * 3^attempt`, scaled by a random
/// factor in `[0.8, 1.2)` so a burst of jobs failing at once doesn't
/// retry in lockstep and hammer the same downstream dependency again.
pub fn backoff_delay(base: std::time::Duration, attempt: u32) -> std::time::Duration {
    let exp = 3u32.saturating_pow(attempt.min(10));
    let jitter = rand::thread_rng().gen_range(0.8..1.2);
    base.mul_f64(exp as f64 * jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn backoff_grows_by_power_of_three() {
        let base = Duration::from_secs(10);
        let d0 = backoff_delay(base, 0);
        let d1 = backoff_delay(base, 1);
        // with jitter in [0.8, 1.2), d1 should still clearly exceed d0's upper bound / 3 ratio roughly
        assert!(d1.as_secs_f64() > d0.as_secs_f64());
    }

    #[test]
    fn backoff_stays_within_jitter_bounds() {
        let base = Duration::from_secs(60);
        for _ in 0..50 {
            let d = backoff_delay(base, 2);
            let expected = 60.0 * 9.0;
            assert!(d.as_secs_f64() >= expected * 0.8 - 0.001);
            assert!(d.as_secs_f64() <= expected * 1.2 + 0.001);
        }
    }
}
