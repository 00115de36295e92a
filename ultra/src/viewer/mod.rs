//! Context viewer - a local page for reading and editing a session's log.
//!
//! Runs as a separate `ultra view` process launched by the chat session.
//! It never talks to the session directly; both sides share the mirror
//! snapshot file.
//!
//! Endpoints:
//! - GET / - Editor page
//! - GET /api/context - Current mirror snapshot
//! - PUT /api/context - Replace the mirror with edited text

mod text;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::bridge::{read_snapshot, write_backup, write_snapshot, MirrorError};
use crate::models::Message;

pub use text::{parse_text, render_text};

const REFRESH_PLACEHOLDER: &str = "__REFRESH_MS__";

/// Settings for one viewer process.
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub mirror: PathBuf,
    pub port: u16,
    pub refresh_ms: u64,
    pub open_browser: bool,
}

/// Shared viewer state.
#[derive(Debug)]
pub struct ViewerState {
    mirror: PathBuf,
    refresh_ms: u64,
}

impl ViewerState {
    pub fn new(mirror: impl Into<PathBuf>, refresh_ms: u64) -> Self {
        Self {
            mirror: mirror.into(),
            refresh_ms,
        }
    }
}

// === Request/Response Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct ContextResponse {
    pub checksum: String,
    pub messages: Vec<Message>,
    /// Editor rendering of `messages`.
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: usize,
    pub checksum: String,
}

// === Server Lifecycle ===

pub fn router(state: Arc<ViewerState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/context", get(get_context).put(put_context))
        .with_state(state)
}

/// Serve the viewer until the process is killed.
pub async fn start_viewer(options: ViewerOptions) -> Result<()> {
    let state = Arc::new(ViewerState::new(&options.mirror, options.refresh_ms));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], options.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind context viewer on {addr}"))?;
    tracing::info!(mirror = %options.mirror.display(), "Context viewer listening on http://{addr}");

    if options.open_browser {
        if let Err(e) = open::that(format!("http://{addr}")) {
            tracing::debug!("Could not open browser: {e}");
        }
    }

    axum::serve(listener, app).await.context("Viewer error")?;
    Ok(())
}

// === Handlers ===

async fn index_handler(State(state): State<Arc<ViewerState>>) -> Html<String> {
    Html(include_str!("ui.html").replace(REFRESH_PLACEHOLDER, &state.refresh_ms.to_string()))
}

async fn get_context(
    State(state): State<Arc<ViewerState>>,
) -> Result<Json<ContextResponse>, StatusCode> {
    let snapshot = read_snapshot(&state.mirror).map_err(|e| {
        tracing::debug!("Mirror unreadable: {e}");
        status_for(&e)
    })?;

    Ok(Json(ContextResponse {
        text: render_text(&snapshot.messages),
        checksum: snapshot.checksum,
        messages: snapshot.messages,
    }))
}

async fn put_context(
    State(state): State<Arc<ViewerState>>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, StatusCode> {
    let messages = parse_text(&req.text);

    let snapshot = write_snapshot(&state.mirror, &messages).map_err(|e| {
        tracing::warn!("Failed to write mirror: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if let Err(e) = write_backup(&state.mirror, &snapshot) {
        tracing::debug!("Failed to write mirror backup: {e}");
    }

    tracing::info!(count = messages.len(), "Context saved from viewer");
    Ok(Json(SaveResponse {
        saved: messages.len(),
        checksum: snapshot.checksum,
    }))
}

fn status_for(error: &MirrorError) -> StatusCode {
    match error {
        MirrorError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        MirrorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        MirrorError::Decode(_)
        | MirrorError::ChecksumMismatch
        | MirrorError::UnsupportedVersion(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::backup_path;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> Arc<ViewerState> {
        Arc::new(ViewerState::new(dir.path().join("mirror.json"), 1500))
    }

    #[tokio::test]
    async fn test_index_injects_refresh_interval() {
        let dir = TempDir::new().unwrap();
        let Html(page) = index_handler(State(state(&dir))).await;
        assert!(page.contains("1500"));
        assert!(!page.contains(REFRESH_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_get_context_statuses() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let missing = get_context(State(Arc::clone(&state))).await;
        assert_eq!(missing.unwrap_err(), StatusCode::NOT_FOUND);

        std::fs::write(&state.mirror, "garbage").unwrap();
        let corrupt = get_context(State(Arc::clone(&state))).await;
        assert_eq!(corrupt.unwrap_err(), StatusCode::UNPROCESSABLE_ENTITY);

        write_snapshot(&state.mirror, &[Message::user("hi")]).unwrap();
        let Json(body) = get_context(State(state)).await.unwrap();
        assert_eq!(body.messages, vec![Message::user("hi")]);
        assert_eq!(body.text, "USER: hi");
    }

    #[tokio::test]
    async fn test_put_context_writes_mirror_and_backup() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let request = SaveRequest {
            text: "USER: edited\n\nASSISTANT: answer".to_string(),
        };
        let Json(saved) = put_context(State(Arc::clone(&state)), Json(request))
            .await
            .unwrap();

        assert_eq!(saved.saved, 2);
        let snapshot = read_snapshot(&state.mirror).unwrap();
        assert_eq!(snapshot.checksum, saved.checksum);
        assert_eq!(
            snapshot.messages,
            vec![Message::user("edited"), Message::assistant("answer")]
        );
        assert_eq!(read_snapshot(&backup_path(&state.mirror)).unwrap(), snapshot);
    }
}
