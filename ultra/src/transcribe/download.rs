//! Audio download through `yt-dlp`.

use std::path::{Path, PathBuf};

use regex::Regex;

use super::TranscribeError;
use crate::process::{run_tool_streaming, OutputLine, ToolCommand};

pub const DOWNLOADER: &str = "yt-dlp";

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36 Edg/127.0.0.0";

const FALLBACK_ID: &str = "video";
const VIDEO_ID_PATTERN: &str = r"(?:youtu\.be/|[?&]v=)([A-Za-z0-9_-]+)";

/// Video id from a `youtu.be/<id>` or `...?v=<id>` URL, else `"video"`.
pub fn extract_video_id(url: &str) -> String {
    Regex::new(VIDEO_ID_PATTERN)
        .ok()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| FALLBACK_ID.to_string(), |m| m.as_str().to_string())
}

pub fn audio_path(audio_dir: &Path, video_id: &str) -> PathBuf {
    audio_dir.join(format!("{video_id}.mp3"))
}

/// Download the audio track as mp3 into `audio_dir`. Returns the video id.
pub async fn download_audio(url: &str, audio_dir: &Path) -> Result<String, TranscribeError> {
    std::fs::create_dir_all(audio_dir).map_err(|e| TranscribeError::io(audio_dir, e))?;

    let video_id = extract_video_id(url);
    let template = audio_dir.join(format!("{video_id}.%(ext)s"));
    let command = ToolCommand::new(DOWNLOADER)
        .args(["-f", "bestaudio", "-o"])
        .arg(&template)
        .args(["--extract-audio", "--audio-format", "mp3", "--user-agent", USER_AGENT])
        .arg(url);

    tracing::info!(url, video_id = %video_id, "Downloading audio");
    run_tool_streaming(&command, |line| match line {
        OutputLine::Stdout(l) => tracing::info!(target: "yt-dlp", "{l}"),
        OutputLine::Stderr(l) => tracing::debug!(target: "yt-dlp", "{l}"),
    })
    .await?
    .ensure_success()?;

    let path = audio_path(audio_dir, &video_id);
    if !path.exists() {
        return Err(TranscribeError::MissingOutput(path));
    }
    tracing::info!(path = %path.display(), "Download complete");
    Ok(video_id)
}
