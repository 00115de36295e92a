//! Video to document: download the audio, transcribe it, have the model tidy
//! the text and render a markdown document next to the raw transcript.

mod document;
mod download;
mod metadata;
mod sentences;
mod templates;
mod whisper;

use std::path::{Path, PathBuf};

use crate::config::Paths;
use crate::process::ToolError;
use crate::provider::{Provider, ProviderError};
use crate::ui;

pub use document::{render_document, write_document};
pub use download::{audio_path, download_audio, extract_video_id};
pub use metadata::{
    fetch_metadata, format_count, format_duration, format_upload_date, VideoMetadata,
};
pub use sentences::{segment_sentences, sentence_lines};
pub use templates::Template;
pub use whisper::transcribe_audio;

#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("expected output {0} was not produced")]
    MissingOutput(PathBuf),

    #[error("the transcript is empty")]
    EmptyTranscript,

    #[error("metadata: {0}")]
    Metadata(String),

    #[error("formatting failed: {0}")]
    Provider(#[from] ProviderError),
}

impl TranscribeError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Run every stage for `url` and open the resulting document.
pub async fn run_pipeline(
    url: &str,
    paths: &Paths,
    provider: &dyn Provider,
    template: Template,
) -> Result<PathBuf, TranscribeError> {
    ui::notice(&format!("Downloading audio: {url}"));
    let video_id = download_audio(url, &paths.audio).await?;

    let metadata = fetch_metadata(url, &video_id, &paths.json).await;

    ui::notice("Transcribing audio (this can take a while)...");
    let raw = transcribe_audio(
        &audio_path(&paths.audio, &video_id),
        &paths.transcript,
        &paths.models,
    )
    .await?;

    ui::notice("Formatting with AI...");
    let document = finish_transcript(&metadata, &raw, &paths.transcript, provider, template).await?;

    if let Err(e) = open::that(&document) {
        tracing::debug!("Could not open {}: {e}", document.display());
    }
    Ok(document)
}

/// Segment, reformat and render a raw transcript.
///
/// Leaves `<id>-final.txt` and `<id>.md` in `dir`; the intermediate
/// `-raw.txt` and `-sentences.txt` files are removed.
pub async fn finish_transcript(
    metadata: &VideoMetadata,
    raw: &str,
    dir: &Path,
    provider: &dyn Provider,
    template: Template,
) -> Result<PathBuf, TranscribeError> {
    std::fs::create_dir_all(dir).map_err(|e| TranscribeError::io(dir, e))?;
    let id = &metadata.id;

    let raw_path = dir.join(format!("{id}-raw.txt"));
    write_file(&raw_path, raw)?;

    let lines = sentence_lines(raw);
    let sentences_path = dir.join(format!("{id}-sentences.txt"));
    write_file(&sentences_path, &lines)?;

    let formatted = provider
        .get_completion(provider.cheapest_model(), &template.prompt(&lines))
        .await?;
    write_file(&dir.join(format!("{id}-final.txt")), &formatted)?;

    for intermediate in [&raw_path, &sentences_path] {
        if let Err(e) = std::fs::remove_file(intermediate) {
            tracing::debug!("Could not remove {}: {e}", intermediate.display());
        }
    }

    write_document(metadata, &formatted, dir)
}

fn write_file(path: &Path, content: &str) -> Result<(), TranscribeError> {
    std::fs::write(path, content).map_err(|e| TranscribeError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::ScriptedProvider;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_finish_transcript() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider::completing("Speaker 1: Hello there. How are you?");
        let metadata = VideoMetadata::unknown("abc");

        let doc = finish_transcript(
            &metadata,
            "hello there. how are\nyou?",
            dir.path(),
            &provider,
            Template::Speakers,
        )
        .await
        .unwrap();

        assert_eq!(doc, dir.path().join("abc.md"));
        assert!(std::fs::read_to_string(&doc)
            .unwrap()
            .contains("Speaker 1: Hello there. How are you?"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("abc-final.txt")).unwrap(),
            "Speaker 1: Hello there. How are you?"
        );
        assert!(!dir.path().join("abc-raw.txt").exists());
        assert!(!dir.path().join("abc-sentences.txt").exists());

        let prompt = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.starts_with(Template::Speakers.instruction()));
        assert!(prompt.ends_with("hello there.\nhow are you?"));
    }

    #[tokio::test]
    async fn test_finish_transcript_provider_failure() {
        let dir = TempDir::new().unwrap();
        let result = finish_transcript(
            &VideoMetadata::unknown("abc"),
            "text.",
            dir.path(),
            &ScriptedProvider::failing(),
            Template::Exact,
        )
        .await;

        assert!(matches!(result, Err(TranscribeError::Provider(_))));
        assert!(!dir.path().join("abc.md").exists());
    }
}
