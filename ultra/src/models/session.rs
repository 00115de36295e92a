//! On-disk session records.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

/// A saved session as seen by `ultra sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session name (file stem).
    pub name: String,
    /// Path of the session file.
    pub path: PathBuf,
    /// Number of messages stored in the file.
    pub message_count: usize,
    /// Last modification time of the file.
    pub modified_at: Option<DateTime<Local>>,
}
