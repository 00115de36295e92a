//! Running the external tools the transcription pipeline depends on.

mod spawn;

pub use spawn::{run_tool, run_tool_streaming, OutputLine, ToolCommand, ToolError, ToolOutput};
