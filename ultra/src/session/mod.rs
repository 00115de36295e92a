//! Interactive session: command parsing and the chat loop.

mod chat;
mod dispatch;

pub use chat::{select_model, ChatSession, Flow, SessionState};
pub use dispatch::{help_text, parse_input, Command, Input, InputError};
