//! Ultra - a terminal chat client for language models.
//!
//! Keeps the conversation in an ordered message log that can be saved,
//! exported, compacted by the model, and edited live in a browser through a
//! mirrored snapshot file. A side pipeline turns videos into transcripts.
//!
//! Architecture:
//! - `session` runs the prompt loop and dispatches slash commands
//! - `context` owns the message log and its persistence
//! - `bridge` mirrors the log to a file and folds viewer edits back in
//! - `viewer` is the local web page, run as a separate `ultra view` process
//! - `provider` talks to the model API
//! - `transcribe` drives yt-dlp and whisper through `process`

pub mod bridge;
pub mod cli;
pub mod config;
pub mod context;
pub mod logging;
pub mod models;
pub mod names;
pub mod process;
pub mod provider;
pub mod session;
pub mod transcribe;
pub mod ui;
pub mod viewer;
