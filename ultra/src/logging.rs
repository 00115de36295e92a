//! File-based tracing. The terminal belongs to the chat, so log records go
//! to `<working_dir>/logs/<file>`.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `ULTRA_LOG=debug`.
pub const LOG_ENV: &str = "ULTRA_LOG";

pub const CHAT_LOG: &str = "ultra.log";
pub const VIEWER_LOG: &str = "viewer.log";

/// Install the global subscriber. Returns the log file path.
pub fn init_logging(logs_dir: &Path, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;
    let path = logs_dir.join(file_name);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;

    Ok(path)
}
