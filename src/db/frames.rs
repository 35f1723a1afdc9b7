use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::frame::{Frame, FrameWithOcr};

pub struct FrameStore;

impl FrameStore {
    pub async fn insert(
        pool: &PgPool,
        video_id: Uuid,
        frame_number: i32,
        frame_time: f64,
        path: &str,
    ) -> Result<Frame> {
        let frame = sqlx::query_as::<_, Frame>(
            r#"
            INSERT INTO frames (id, video_id, frame_number, frame_time, path, greyscale_is_processed, created_at)
            VALUES ($1, $2, $3, $4, $5, false, now())
            ON CONFLICT (video_id, frame_number) DO UPDATE SET frame_time = EXCLUDED.frame_time
            RETURNING id, video_id, frame_number, frame_time, path, greyscale_is_processed, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(video_id)
        .bind(frame_number)
        .bind(frame_time)
        .bind(path)
        .fetch_one(pool)
        .await?;

        Ok(frame)
    }

    pub async fn mark_greyscaled(pool: &PgPool, frame_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE frames SET greyscale_is_processed = true WHERE id = $1")
            .bind(frame_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn list_for_video(
        pool: &PgPool,
        video_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FrameWithOcr>> {
        let rows = sqlx::query_as::<_, FrameWithOcr>(
            r#"
            SELECT
                f.id,
                f.video_id,
                f.frame_number,
                f.frame_time,
                f.path,
                o.ocr_text,
                NULL::text AS presigned_url
            FROM frames f
            LEFT JOIN ocr_frames o ON o.frame_key = f.path
            WHERE f.video_id = $1
            ORDER BY f.frame_number ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(video_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn find_by_number(
        pool: &PgPool,
        video_id: Uuid,
        frame_number: i32,
    ) -> Result<Option<Frame>> {
        let frame = sqlx::query_as::<_, Frame>(
            "SELECT id, video_id, frame_number, frame_time, path, greyscale_is_processed, created_at \
             FROM frames WHERE video_id = $1 AND frame_number = $2",
        )
        .bind(video_id)
        .bind(frame_number)
        .fetch_optional(pool)
        .await?;

        Ok(frame)
    }

    pub async fn get(pool: &PgPool, frame_id: Uuid) -> Result<Option<Frame>> {
        let frame = sqlx::query_as::<_, Frame>(
            "SELECT id, video_id, frame_number, frame_time, path, greyscale_is_processed, created_at FROM frames WHERE id = $1",
        )
        .bind(frame_id)
        .fetch_optional(pool)
        .await?;

        Ok(frame)
    }
}
