//! Data models for ultra entities.

mod message;
mod session;

pub use message::{Message, MessageRole};
pub use session::SessionSummary;
