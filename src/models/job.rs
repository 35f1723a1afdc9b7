use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Sample,
    Greyscale,
    Ocr,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Sample => "sample",
            JobType::Greyscale => "greyscale",
            JobType::Ocr => "ocr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub video_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub retry_count: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in a job payload's `errors` array, appended (never replaced)
/// on every nack so the full retry history survives to the terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorEntry {
    pub at: DateTime<Utc>,
    pub message: String,
    pub attempt: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleJobPayload {
    pub video_id: Uuid,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreyscaleJobPayload {
    pub video_id: Uuid,
    pub frame_number: i32,
    pub frame_s3_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrJobPayload {
    pub video_id: Uuid,
    pub frame_s3_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub job_type: JobType,
    pub queued: i64,
    pub processing: i64,
    pub done: i64,
    pub failed: i64,
}
