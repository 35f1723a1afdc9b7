use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ocr_frame::OcrFrame;

pub struct OcrFrameStore;

impl OcrFrameStore {
    /// Upserts on `frame_key`, not on a generated id — the OCR worker may
    /// reprocess a frame (retry, manual re-run) and must overwrite the
    /// prior text rather than accumulate duplicate rows. The `ocr_index`
    /// sync triggers key off this same column, so it must stay stable.
    pub async fn upsert(
        pool: &PgPool,
        video_id: Uuid,
        frame_key: &str,
        ocr_text: &str,
    ) -> Result<OcrFrame> {
        let row = sqlx::query_as::<_, OcrFrame>(
            r#"
            INSERT INTO ocr_frames (id, video_id, frame_key, ocr_text, is_processed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, true, now(), now())
            ON CONFLICT (frame_key) DO UPDATE
                SET ocr_text = EXCLUDED.ocr_text, is_processed = true, updated_at = now()
            RETURNING id, video_id, frame_key, ocr_text, is_processed, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(video_id)
        .bind(frame_key)
        .bind(ocr_text)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    pub async fn get_by_key(pool: &PgPool, frame_key: &str) -> Result<Option<OcrFrame>> {
        let row = sqlx::query_as::<_, OcrFrame>(
            "SELECT id, video_id, frame_key, ocr_text, is_processed, created_at, updated_at FROM ocr_frames WHERE frame_key = $1",
        )
        .bind(frame_key)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }
}
