use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Frame {
    pub id: Uuid,
    pub video_id: Uuid,
    pub frame_number: i32,
    pub frame_time: f64,
    pub path: String,
    pub greyscale_is_processed: bool,
    pub created_at: DateTime<Utc>,
}

/// A frame joined with its (possibly absent) OCR text, as returned by the
/// frame-listing endpoint. `presigned_url` is filled in by the route layer,
/// not by the DB query — it depends on the caller's requested TTL.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FrameWithOcr {
    pub id: Uuid,
    pub video_id: Uuid,
    pub frame_number: i32,
    pub frame_time: f64,
    pub path: String,
    pub ocr_text: Option<String>,
    #[sqlx(default)]
    pub presigned_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FramesResponse {
    pub items: Vec<FrameWithOcr>,
    pub limit: i64,
    pub offset: i64,
}
