use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

fn frame_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"frame_(\d+)\.(jpg|png|jpeg)$").expect("valid regex"))
}

/// Pulls the ordinal out of a frame key like `.../frame_0007.jpg`.
/// Returns `None` for keys that don't follow the sampler's naming
/// convention (shouldn't happen in practice, but search must not panic
/// on a hand-edited row).
pub fn parse_frame_number(key: &str) -> Option<i32> {
    frame_number_re()
        .captures(key)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub expires_in: Option<i64>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub video_id: Uuid,
    pub frame_key: String,
    pub filename: String,
    pub frame_number: Option<i32>,
    pub snippet: String,
    pub ocr_text: String,
    pub presigned_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub items: Vec<SearchHit>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

pub const MAX_OCR_TEXT_CHARS: usize = 8000;

/// Truncates OCR text to the API cap, always on a char boundary.
pub fn cap_ocr_text(text: &str) -> String {
    if text.chars().count() <= MAX_OCR_TEXT_CHARS {
        text.to_string()
    } else {
        text.chars().take(MAX_OCR_TEXT_CHARS).collect()
    }
}

/// Object-store key's final path segment, used as the display filename
/// for a search hit (e.g. `frame_0003.jpg`).
pub fn basename(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_number_from_sample_key() {
        assert_eq!(
            parse_frame_number("videos/abc/samples/frame_0007.jpg"),
            Some(7)
        );
    }

    #[test]
    fn parses_frame_number_from_greyscale_key() {
        assert_eq!(
            parse_frame_number("videos/abc/greyscaled/frame_0123.png"),
            Some(123)
        );
    }

    #[test]
    fn returns_none_for_non_frame_key() {
        assert_eq!(parse_frame_number("videos/abc/source.mp4"), None);
    }

    #[test]
    fn caps_long_ocr_text() {
        let text = "a".repeat(MAX_OCR_TEXT_CHARS + 50);
        let capped = cap_ocr_text(&text);
        assert_eq!(capped.chars().count(), MAX_OCR_TEXT_CHARS);
    }

    #[test]
    fn leaves_short_ocr_text_untouched() {
        assert_eq!(cap_ocr_text("hello"), "hello");
    }

    #[test]
    fn basename_strips_prefix() {
        assert_eq!(basename("videos/abc/samples/frame_0001.jpg"), "frame_0001.jpg");
        assert_eq!(basename("frame_0001.jpg"), "frame_0001.jpg");
    }
}
