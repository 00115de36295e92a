//! Video metadata from `yt-dlp --print-json`, formatted for the document.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::download::{DOWNLOADER, USER_AGENT};
use super::TranscribeError;
use crate::process::{run_tool, ToolCommand};

/// A metadata query that hangs must not stall the pipeline.
const INFO_TIMEOUT: Duration = Duration::from_secs(120);

/// Metadata fields kept for the document, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration: String,
    pub upload_date: String,
    pub view_count: String,
    pub like_count: String,
    pub comment_count: String,
    pub uploader: String,
    pub uploader_id: String,
    pub categories: String,
    pub tags: String,
}

impl VideoMetadata {
    /// Placeholder values used when metadata cannot be fetched.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: "Unknown Title".to_string(),
            description: "No Description".to_string(),
            thumbnail: "No Thumbnail".to_string(),
            duration: "Unknown Duration".to_string(),
            upload_date: "Unknown Upload Date".to_string(),
            view_count: "Unknown View Count".to_string(),
            like_count: "Unknown Like Count".to_string(),
            comment_count: "Unknown Comment Count".to_string(),
            uploader: "Unknown Uploader".to_string(),
            uploader_id: "Unknown Uploader ID".to_string(),
            categories: String::new(),
            tags: String::new(),
        }
    }

    /// Pick and format the fields of a yt-dlp info document.
    pub fn from_info(info: &Value, fallback_id: &str) -> Self {
        let defaults = Self::unknown(fallback_id);
        let text = |key: &str, default: String| {
            info.get(key)
                .and_then(Value::as_str)
                .map_or(default, String::from)
        };
        let count = |key: &str, default: String| {
            info.get(key).and_then(format_count).unwrap_or(default)
        };
        let joined = |key: &str| {
            info.get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default()
        };

        let upload_date = info
            .get("upload_date")
            .and_then(Value::as_str)
            .map_or(defaults.upload_date, |raw| {
                format_upload_date(raw).unwrap_or_else(|| raw.to_string())
            });
        let duration = info
            .get("duration")
            .and_then(Value::as_f64)
            .map_or(defaults.duration, format_duration);

        Self {
            id: text("id", defaults.id),
            title: text("title", defaults.title),
            description: text("description", defaults.description),
            thumbnail: text("thumbnail", defaults.thumbnail),
            duration,
            upload_date,
            view_count: count("view_count", defaults.view_count),
            like_count: count("like_count", defaults.like_count),
            comment_count: count("comment_count", defaults.comment_count),
            uploader: text("uploader", defaults.uploader),
            uploader_id: text("uploader_id", defaults.uploader_id),
            categories: joined("categories"),
            tags: joined("tags"),
        }
    }

    /// Write to `<json_dir>/custom-<id>.json`.
    pub fn save(&self, json_dir: &Path) -> Result<PathBuf, TranscribeError> {
        std::fs::create_dir_all(json_dir).map_err(|e| TranscribeError::io(json_dir, e))?;
        let path = json_dir.join(format!("custom-{}.json", self.id));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TranscribeError::Metadata(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| TranscribeError::io(&path, e))?;
        Ok(path)
    }
}

/// Fetch and save metadata. Never fails: problems are logged and
/// placeholder values returned.
pub async fn fetch_metadata(url: &str, video_id: &str, json_dir: &Path) -> VideoMetadata {
    let metadata = match query_info(url).await {
        Ok(info) => VideoMetadata::from_info(&info, video_id),
        Err(e) => {
            tracing::warn!(url, "Metadata unavailable: {e}");
            VideoMetadata::unknown(video_id)
        }
    };

    match metadata.save(json_dir) {
        Ok(path) => tracing::info!(path = %path.display(), "Metadata saved"),
        Err(e) => tracing::warn!("Failed to save metadata: {e}"),
    }
    metadata
}

async fn query_info(url: &str) -> Result<Value, TranscribeError> {
    let command = ToolCommand::new(DOWNLOADER)
        .args(["--skip-download", "--print-json", "--user-agent", USER_AGENT])
        .arg(url)
        .timeout(INFO_TIMEOUT);
    let output = run_tool(&command).await?.ensure_success()?;

    serde_json::from_str(output.stdout_string().trim())
        .map_err(|e| TranscribeError::Metadata(format!("invalid {DOWNLOADER} JSON: {e}")))
}

/// `1234567` -> `"1,234,567"`. Non-numbers yield `None`.
pub fn format_count(value: &Value) -> Option<String> {
    if let Some(n) = value.as_u64() {
        return Some(group_thousands(&n.to_string()));
    }
    if let Some(n) = value.as_i64() {
        return Some(format!("-{}", group_thousands(&n.unsigned_abs().to_string())));
    }
    let n = value.as_f64()?;
    let rendered = n.abs().to_string();
    let (whole, fraction) = rendered.split_once('.').unwrap_or((&rendered, ""));
    let sign = if n < 0.0 { "-" } else { "" };
    let grouped = group_thousands(whole);
    Some(if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction}")
    })
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `"20250402"` -> `"April 2, 2025"`.
pub fn format_upload_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .ok()
        .map(|date| date.format("%B %-d, %Y").to_string())
}

/// Seconds as `MM:SS`, or `HH:MM:SS` from one hour up.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(&json!(0)).as_deref(), Some("0"));
        assert_eq!(format_count(&json!(999)).as_deref(), Some("999"));
        assert_eq!(format_count(&json!(1000)).as_deref(), Some("1,000"));
        assert_eq!(format_count(&json!(1_234_567)).as_deref(), Some("1,234,567"));
        assert_eq!(format_count(&json!(1234.5)).as_deref(), Some("1,234.5"));
        assert_eq!(format_count(&json!("many")), None);
    }

    #[test]
    fn test_format_upload_date() {
        assert_eq!(format_upload_date("20250402").as_deref(), Some("April 2, 2025"));
        assert_eq!(format_upload_date("20231231").as_deref(), Some("December 31, 2023"));
        assert_eq!(format_upload_date("yesterday"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(59.0), "00:59");
        assert_eq!(format_duration(754.9), "12:34");
        assert_eq!(format_duration(3600.0), "01:00:00");
        assert_eq!(format_duration(37_230.0), "10:20:30");
    }

    #[test]
    fn test_from_info() {
        let info = json!({
            "id": "abc123",
            "title": "A Talk",
            "duration": 3725,
            "upload_date": "20250402",
            "view_count": 1_500_000,
            "like_count": 42,
            "uploader": "Someone",
            "categories": ["Education", "Science"],
            "tags": ["rust"],
        });

        let meta = VideoMetadata::from_info(&info, "fallback");
        assert_eq!(meta.id, "abc123");
        assert_eq!(meta.duration, "01:02:05");
        assert_eq!(meta.upload_date, "April 2, 2025");
        assert_eq!(meta.view_count, "1,500,000");
        assert_eq!(meta.like_count, "42");
        assert_eq!(meta.comment_count, "Unknown Comment Count");
        assert_eq!(meta.description, "No Description");
        assert_eq!(meta.categories, "Education, Science");
        assert_eq!(meta.tags, "rust");
    }

    #[test]
    fn test_unparseable_date_is_kept() {
        let meta = VideoMetadata::from_info(&json!({"upload_date": "sometime"}), "x");
        assert_eq!(meta.id, "x");
        assert_eq!(meta.upload_date, "sometime");
    }

    #[test]
    fn test_save() {
        let dir = TempDir::new().unwrap();
        let meta = VideoMetadata::unknown("abc");
        let path = meta.save(dir.path()).unwrap();

        assert_eq!(path, dir.path().join("custom-abc.json"));
        let reread: VideoMetadata =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(reread, meta);
    }
}
