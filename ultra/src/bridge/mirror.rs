//! The mirror snapshot file shared with the external context viewer.
//!
//! Writes go to a temporary file in the same directory followed by a rename,
//! so a reader sees either the previous snapshot or the new one. Each
//! snapshot carries a SHA-256 of its messages; a mismatch means the file is
//! corrupt and it is ignored.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Message;

/// Format version written into every snapshot.
pub const MIRROR_VERSION: u32 = 1;

const BACKUP_SUFFIX: &str = "backup";

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("mirror I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("mirror content is not a snapshot: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("mirror checksum mismatch")]
    ChecksumMismatch,

    #[error("unsupported mirror version {0}")]
    UnsupportedVersion(u32),
}

/// Serialized copy of the message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    pub version: u32,
    pub checksum: String,
    pub messages: Vec<Message>,
}

impl MirrorSnapshot {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            version: MIRROR_VERSION,
            checksum: checksum(&messages),
            messages,
        }
    }

    pub fn verify(&self) -> Result<(), MirrorError> {
        if self.version != MIRROR_VERSION {
            return Err(MirrorError::UnsupportedVersion(self.version));
        }
        if checksum(&self.messages) != self.checksum {
            return Err(MirrorError::ChecksumMismatch);
        }
        Ok(())
    }
}

/// Hex SHA-256 of the messages' canonical JSON.
pub fn checksum(messages: &[Message]) -> String {
    let bytes = serde_json::to_vec(messages).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

/// Atomically replace `path` with a snapshot of `messages`.
pub fn write_snapshot(path: &Path, messages: &[Message]) -> Result<MirrorSnapshot, MirrorError> {
    let snapshot = MirrorSnapshot::new(messages.to_vec());
    let json = serde_json::to_vec_pretty(&snapshot)?;
    write_atomic(path, &json)?;
    Ok(snapshot)
}

/// Read and verify the snapshot at `path`.
pub fn read_snapshot(path: &Path) -> Result<MirrorSnapshot, MirrorError> {
    let bytes = fs::read(path)?;
    let snapshot: MirrorSnapshot = serde_json::from_slice(&bytes)?;
    snapshot.verify()?;
    Ok(snapshot)
}

/// Keep a copy of a snapshot next to the mirror file.
pub fn write_backup(path: &Path, snapshot: &MirrorSnapshot) -> Result<PathBuf, MirrorError> {
    let backup = backup_path(path);
    let json = serde_json::to_vec_pretty(snapshot)?;
    write_atomic(&backup, &json)?;
    Ok(backup)
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{BACKUP_SUFFIX}"));
    path.with_file_name(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MirrorError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// One side's handle on the mirror file.
///
/// Remembers the checksum of the last snapshot this side wrote or accepted,
/// so polling an unchanged file is a no-op.
#[derive(Debug)]
pub struct MirrorFile {
    path: PathBuf,
    last_checksum: Mutex<Option<String>>,
}

impl MirrorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_checksum: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the log to the mirror and remember it as current.
    pub fn publish(&self, messages: &[Message]) -> Result<(), MirrorError> {
        let snapshot = write_snapshot(&self.path, messages)?;
        self.remember(snapshot.checksum);
        Ok(())
    }

    /// Read the mirror if it changed since the last publish or accept.
    pub fn poll_changed(&self) -> Result<Option<MirrorSnapshot>, MirrorError> {
        let snapshot = read_snapshot(&self.path)?;
        let last = self
            .last_checksum
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(snapshot.checksum.as_str()) {
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    pub fn remember(&self, checksum: String) {
        *self
            .last_checksum
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(checksum);
    }
}
