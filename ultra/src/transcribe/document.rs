//! The final transcript document.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::metadata::VideoMetadata;
use super::TranscribeError;

const SEPARATOR: &str = "---";

/// Markdown with title, snapshot line, description and transcript.
pub fn render_document(metadata: &VideoMetadata, transcript: &str) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# 🎬 Video Title\n");
    let _ = writeln!(doc, "## \"{}\"\n", metadata.title);
    let _ = writeln!(doc, "{SEPARATOR}\n");
    let _ = writeln!(doc, "## 🎥 Video Snapshot\n");

    let channel_text = channel(metadata);
    let snapshot = [
        ("Duration", &metadata.duration),
        ("Uploaded", &metadata.upload_date),
        ("Views", &metadata.view_count),
        ("Likes", &metadata.like_count),
        ("Comments", &metadata.comment_count),
        ("Channel", &channel_text),
        ("Category", &metadata.categories),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(label, value)| format!("**{label}:** {value}"))
    .collect::<Vec<_>>()
    .join(" | ");
    let _ = writeln!(doc, "{snapshot}\n");

    let _ = writeln!(doc, "## 📝 Description:\n");
    let _ = writeln!(doc, "{}\n", metadata.description.trim());
    let _ = writeln!(doc, "{SEPARATOR}\n");
    let _ = writeln!(doc, "## 📜 Video Transcript\n");
    let _ = writeln!(doc, "{}", transcript.trim());
    doc
}

/// `uploader (uploader_id)`, or whichever half is known.
fn channel(metadata: &VideoMetadata) -> String {
    match (metadata.uploader.as_str(), metadata.uploader_id.as_str()) {
        (name, "") => name.to_string(),
        ("", id) => id.to_string(),
        (name, id) => format!("{name} ({id})"),
    }
}

/// Write `<dir>/<id>.md` and return its path.
pub fn write_document(
    metadata: &VideoMetadata,
    transcript: &str,
    dir: &Path,
) -> Result<PathBuf, TranscribeError> {
    std::fs::create_dir_all(dir).map_err(|e| TranscribeError::io(dir, e))?;
    let path = dir.join(format!("{}.md", metadata.id));
    std::fs::write(&path, render_document(metadata, transcript))
        .map_err(|e| TranscribeError::io(&path, e))?;
    tracing::info!(path = %path.display(), "Document created");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            title: "A Talk".to_string(),
            duration: "12:34".to_string(),
            upload_date: "April 2, 2025".to_string(),
            view_count: "1,000".to_string(),
            categories: String::new(),
            description: "About things.\n".to_string(),
            ..VideoMetadata::unknown("abc")
        }
    }

    #[test]
    fn test_document_sections_in_order() {
        let doc = render_document(&metadata(), "  Speaker 1: Hello.\n");

        let order = [
            "# 🎬 Video Title",
            "## \"A Talk\"",
            "## 🎥 Video Snapshot",
            "**Duration:** 12:34 | **Uploaded:** April 2, 2025 | **Views:** 1,000",
            "## 📝 Description:",
            "About things.",
            "## 📜 Video Transcript",
            "Speaker 1: Hello.",
        ];
        let mut from = 0;
        for part in order {
            let at = doc[from..].find(part).unwrap_or_else(|| panic!("missing {part}"));
            from += at + part.len();
        }
        assert!(!doc.contains("Category"));
        assert!(doc.ends_with("Speaker 1: Hello.\n"));
    }

    #[test]
    fn test_channel_shows_uploader_and_id() {
        let mut meta = VideoMetadata {
            uploader: "Rust Talks".to_string(),
            uploader_id: "@rusttalks".to_string(),
            ..metadata()
        };
        let doc = render_document(&meta, "");
        assert!(doc.contains("**Channel:** Rust Talks (@rusttalks)"));

        meta.uploader_id.clear();
        assert_eq!(channel(&meta), "Rust Talks");
        meta.uploader.clear();
        assert!(!render_document(&meta, "").contains("Channel"));
    }

    #[test]
    fn test_write_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_document(&metadata(), "text", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("abc.md"));
        assert!(std::fs::read_to_string(path).unwrap().contains("text"));
    }
}
