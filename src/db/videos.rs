use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::video::{CatalogSummary, Video, VideoStatus, VideoSummary};

pub struct VideoStore;

impl VideoStore {
    pub async fn create(pool: &PgPool, filename: &str, path: &str) -> Result<Video> {
        let video = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (id, filename, path, status, created_at)
            VALUES ($1, $2, $3, 'queued', now())
            RETURNING id, filename, path, status, created_at, processed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(filename)
        .bind(path)
        .fetch_one(pool)
        .await?;

        Ok(video)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(
            "SELECT id, filename, path, status, created_at, processed_at FROM videos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(video)
    }

    pub async fn set_status(pool: &PgPool, id: Uuid, status: VideoStatus) -> Result<()> {
        let processed_at = matches!(status, VideoStatus::Ready | VideoStatus::Failed)
            .then(Utc::now);

        sqlx::query(
            "UPDATE videos SET status = $2, processed_at = COALESCE($3, processed_at) WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(processed_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Derives per-video progress from a join against `frames`, rather
    /// than from a stored counter, so progress can never drift out of
    /// sync with the rows it's counting.
    pub async fn list_summaries(pool: &PgPool, page: i64, page_size: i64) -> Result<Vec<VideoSummary>> {
        let offset = (page.max(1) - 1) * page_size;

        let rows = sqlx::query_as::<_, VideoSummary>(
            r#"
            SELECT
                v.id,
                v.filename,
                v.status,
                v.created_at,
                v.processed_at,
                count(f.id) AS total_frames,
                count(f.id) FILTER (WHERE f.greyscale_is_processed) AS processed_frames
            FROM videos v
            LEFT JOIN frames f ON f.video_id = v.id
            GROUP BY v.id
            ORDER BY v.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_summary(pool: &PgPool, id: Uuid) -> Result<Option<VideoSummary>> {
        let row = sqlx::query_as::<_, VideoSummary>(
            r#"
            SELECT
                v.id,
                v.filename,
                v.status,
                v.created_at,
                v.processed_at,
                count(f.id) AS total_frames,
                count(f.id) FILTER (WHERE f.greyscale_is_processed) AS processed_frames
            FROM videos v
            LEFT JOIN frames f ON f.video_id = v.id
            WHERE v.id = $1
            GROUP BY v.id
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    pub async fn catalog_summary(pool: &PgPool) -> Result<CatalogSummary> {
        let (total_videos,): (i64,) = sqlx::query_as("SELECT count(*) FROM videos")
            .fetch_one(pool)
            .await?;
        let (total_frames,): (i64,) = sqlx::query_as("SELECT count(*) FROM frames")
            .fetch_one(pool)
            .await?;
        let (indexed_frames,): (i64,) = sqlx::query_as(
            "SELECT count(*) FROM ocr_frames WHERE is_processed",
        )
        .fetch_one(pool)
        .await?;

        Ok(CatalogSummary {
            total_videos,
            total_frames,
            indexed_frames,
        })
    }

    /// `(total_frames, ocr_processed_frames)` for a single video, used to
    /// decide when the whole video can flip to `ready`. Joined on
    /// `frames.path = ocr_frames.frame_key` rather than a stored counter.
    pub async fn ocr_progress(pool: &PgPool, video_id: Uuid) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                count(f.id) AS total,
                count(f.id) FILTER (WHERE o.is_processed) AS done
            FROM frames f
            LEFT JOIN ocr_frames o ON o.frame_key = f.path
            WHERE f.video_id = $1
            "#,
        )
        .bind(video_id)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }
}
