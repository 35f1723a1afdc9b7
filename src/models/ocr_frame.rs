use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per frame that OCR has run against, upserted and keyed on
/// `frame_key` (the object-store path), never on row id — the trigger
/// that keeps `OcrIndex` in sync relies on that key staying stable across
/// updates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OcrFrame {
    pub id: Uuid,
    pub video_id: Uuid,
    pub frame_key: String,
    pub ocr_text: String,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
