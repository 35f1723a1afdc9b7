use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Queued,
    Processing,
    Ready,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Queued => "queued",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub id: Uuid,
    pub filename: String,
    pub path: String,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Summary row returned by `list_videos`: counts are derived via a join
/// rather than stored, so they can never drift from the underlying tables.
#[derive(Debug, Clone, FromRow)]
pub struct VideoSummary {
    pub id: Uuid,
    pub filename: String,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub total_frames: i64,
    pub processed_frames: i64,
}

impl VideoSummary {
    pub fn progress_percent(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            (self.processed_frames as f64 / self.total_frames as f64) * 100.0
        }
    }
}

/// Hand-written so `progress_percent` reaches the wire as a real field
/// instead of staying a method nobody calls from the JSON boundary.
impl Serialize for VideoSummary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("VideoSummary", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("filename", &self.filename)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("processed_at", &self.processed_at)?;
        state.serialize_field("total_frames", &self.total_frames)?;
        state.serialize_field("processed_frames", &self.processed_frames)?;
        state.serialize_field("progress_percent", &self.progress_percent())?;
        state.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoListResponse {
    pub items: Vec<VideoSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub summary: VideoSummary,
    pub source_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub video_id: Uuid,
    pub filename: String,
    pub status: VideoStatus,
}

#[derive(Debug, Serialize)]
pub struct CatalogSummary {
    pub total_videos: i64,
    pub total_frames: i64,
    pub indexed_frames: i64,
}
