//! Per-session context: append, clear, compact, save, load, export.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::models::{Message, MessageRole, SessionSummary};
use crate::names::generate_session_name;
use crate::provider::{Provider, ProviderError};

use super::log::{LogChange, MessageLog, SharedLog};

const SESSION_EXTENSION: &str = "json";

const COMPACT_INSTRUCTION: &str = "Summarize the following conversation in a concise manner, \
capturing the key points and context needed to continue logically:";

/// Errors from context operations.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session file {path} is malformed: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("compaction failed: {0}")]
    Provider(#[from] ProviderError),
}

impl ContextError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Owns the message log of one session.
#[derive(Debug)]
pub struct ContextManager {
    session_name: String,
    sessions_dir: PathBuf,
    log: SharedLog,
}

impl ContextManager {
    /// Start an empty session. Without a name, one is derived from the clock.
    pub fn new(session_name: Option<String>, sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_name: session_name.unwrap_or_else(generate_session_name),
            sessions_dir: sessions_dir.into(),
            log: SharedLog::default(),
        }
    }

    /// Restore a session previously written by [`save`](Self::save).
    pub fn load(session_name: &str, sessions_dir: impl Into<PathBuf>) -> Result<Self, ContextError> {
        let sessions_dir = sessions_dir.into();
        let path = session_path(&sessions_dir, session_name);
        let messages = read_session_file(&path)?;
        tracing::info!(session = session_name, count = messages.len(), "Session loaded");

        Ok(Self {
            session_name: session_name.to_string(),
            sessions_dir,
            log: SharedLog::new(MessageLog::from_messages(messages)),
        })
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Shared handle to the log, used by the viewer bridge.
    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Snapshot of the conversation, in order.
    pub fn messages(&self) -> Vec<Message> {
        self.log.snapshot()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    pub fn append(&self, role: MessageRole, content: impl Into<String>) {
        self.log.lock().push(Message::new(role, content));
    }

    pub fn clear(&self) {
        self.log.lock().clear();
        tracing::info!(session = %self.session_name, "Context cleared");
    }

    /// Replace the log with a saved session's messages, keeping observers.
    pub fn replace_with(&self, messages: Vec<Message>) {
        self.log.lock().replace(messages, LogChange::Loaded);
    }

    /// Switch to a saved session in place. The log keeps its observers, so an
    /// attached viewer follows the switch. Returns the number of messages.
    pub fn switch_to(&mut self, session_name: &str) -> Result<usize, ContextError> {
        let messages = read_session_file(&session_path(&self.sessions_dir, session_name))?;
        let count = messages.len();
        self.session_name = session_name.to_string();
        self.replace_with(messages);
        tracing::info!(session = session_name, count, "Switched session");
        Ok(count)
    }

    /// Summarize the whole log into a single `system` message.
    ///
    /// Returns `Ok(false)` without calling the provider when the log is
    /// empty. On provider failure the log is left exactly as it was.
    pub async fn compact(&self, provider: &dyn Provider) -> Result<bool, ContextError> {
        let snapshot = self.messages();
        if snapshot.is_empty() {
            return Ok(false);
        }

        let prompt = compaction_prompt(&snapshot);
        let summary = provider
            .get_completion(provider.cheapest_model(), &prompt)
            .await?;

        self.log.lock().replace(
            vec![Message::system(summary.trim())],
            LogChange::Compacted,
        );
        tracing::info!(
            session = %self.session_name,
            before = snapshot.len(),
            "Context compacted"
        );
        Ok(true)
    }

    /// Path this session saves to.
    pub fn session_file(&self) -> PathBuf {
        session_path(&self.sessions_dir, &self.session_name)
    }

    /// Write the full log to the session file, replacing an earlier save.
    pub fn save(&self) -> Result<PathBuf, ContextError> {
        std::fs::create_dir_all(&self.sessions_dir)
            .map_err(|e| ContextError::io(&self.sessions_dir, e))?;

        let path = self.session_file();
        let messages = self.messages();
        let json = serde_json::to_string_pretty(&messages).map_err(|source| {
            ContextError::Serialize {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(&path, json).map_err(|e| ContextError::io(&path, e))?;

        tracing::info!(path = %path.display(), count = messages.len(), "Session saved");
        Ok(path)
    }

    /// Human-readable rendering: one `ROLE:\ncontent\n` block per message.
    pub fn export_text(&self) -> String {
        export_messages(&self.log.lock())
    }
}

fn export_messages(log: &MessageLog) -> String {
    log.messages()
        .iter()
        .map(|m| format!("{}:\n{}\n", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn compaction_prompt(messages: &[Message]) -> String {
    let mut prompt = format!("{COMPACT_INSTRUCTION}\n\n");
    for message in messages {
        let _ = writeln!(prompt, "{}: {}", message.role.label(), message.content);
    }
    prompt
}

fn session_path(sessions_dir: &Path, session_name: &str) -> PathBuf {
    sessions_dir.join(format!("{session_name}.{SESSION_EXTENSION}"))
}

fn read_session_file(path: &Path) -> Result<Vec<Message>, ContextError> {
    let content = std::fs::read_to_string(path).map_err(|e| ContextError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| ContextError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}

/// Saved sessions, most recently modified first.
pub fn list_sessions(sessions_dir: &Path) -> Result<Vec<SessionSummary>, ContextError> {
    if !sessions_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(sessions_dir).map_err(|e| ContextError::io(sessions_dir, e))?;
    let mut sessions = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };

        let message_count = match read_session_file(&path) {
            Ok(messages) => messages.len(),
            Err(e) => {
                tracing::debug!("Skipping unreadable session {}: {e}", path.display());
                continue;
            }
        };
        let modified_at = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .map(chrono::DateTime::<chrono::Local>::from);

        sessions.push(SessionSummary {
            name,
            path,
            message_count,
            modified_at,
        });
    }

    sessions.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    Ok(sessions)
}
