//! Conversation context: the message log and its per-session manager.

mod log;
mod manager;

pub use log::{LogChange, MessageLog, Observer, ObserverId, SharedLog};
pub use manager::{list_sessions, ContextError, ContextManager};
