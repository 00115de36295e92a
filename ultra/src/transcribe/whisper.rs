//! Speech-to-text through the `whisper` CLI.

use std::path::Path;

use super::TranscribeError;
use crate::process::{run_tool_streaming, ToolCommand};

pub const WHISPER: &str = "whisper";
const WHISPER_MODEL: &str = "base";

/// Transcribe `audio` and return the plain text.
///
/// Whisper writes `<stem>.txt` into `output_dir`; the file is read and
/// removed. Model weights are cached in `models_dir`.
pub async fn transcribe_audio(
    audio: &Path,
    output_dir: &Path,
    models_dir: &Path,
) -> Result<String, TranscribeError> {
    std::fs::create_dir_all(output_dir).map_err(|e| TranscribeError::io(output_dir, e))?;
    std::fs::create_dir_all(models_dir).map_err(|e| TranscribeError::io(models_dir, e))?;

    let command = ToolCommand::new(WHISPER)
        .arg(audio)
        .args([
            "--model",
            WHISPER_MODEL,
            "--device",
            "cpu",
            "--fp16",
            "False",
            "--verbose",
            "False",
            "--output_format",
            "txt",
            "--output_dir",
        ])
        .arg(output_dir)
        .arg("--model_dir")
        .arg(models_dir);

    tracing::info!(audio = %audio.display(), "Transcribing audio");
    run_tool_streaming(&command, |line| tracing::debug!(target: "whisper", "{line:?}"))
        .await?
        .ensure_success()?;

    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text_path = output_dir.join(format!("{stem}.txt"));
    let text = std::fs::read_to_string(&text_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TranscribeError::MissingOutput(text_path.clone())
        } else {
            TranscribeError::io(&text_path, e)
        }
    })?;
    if let Err(e) = std::fs::remove_file(&text_path) {
        tracing::debug!("Could not remove {}: {e}", text_path.display());
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(TranscribeError::EmptyTranscript);
    }
    Ok(text)
}
