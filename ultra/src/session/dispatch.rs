//! Parsing of slash commands typed at the chat prompt.

use crate::names::is_valid_session_name;

/// A parsed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New(Option<String>),
    Clear,
    Save,
    Export,
    Compact,
    Model,
    Context,
    Transcribe(Option<String>),
    Progress,
    Load(String),
    Help,
    Quit,
}

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Blank,
    Command(Command),
    Chat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Unknown command: {0} (type /help for a list)")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid session name: {0}")]
    InvalidSessionName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    New,
    Clear,
    Save,
    Export,
    Compact,
    Model,
    Context,
    Transcribe,
    Progress,
    Load,
    Help,
    Quit,
}

struct CommandSpec {
    name: &'static str,
    usage: &'static str,
    help: &'static str,
    kind: Kind,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "/new", usage: "/new [name]", help: "Start a new session", kind: Kind::New },
    CommandSpec { name: "/clear", usage: "/clear", help: "Clear the conversation context", kind: Kind::Clear },
    CommandSpec { name: "/save", usage: "/save", help: "Save the session to disk", kind: Kind::Save },
    CommandSpec { name: "/export", usage: "/export", help: "Print the conversation as text", kind: Kind::Export },
    CommandSpec { name: "/compact", usage: "/compact", help: "Summarize the context into one message", kind: Kind::Compact },
    CommandSpec { name: "/model", usage: "/model", help: "Switch model", kind: Kind::Model },
    CommandSpec { name: "/context", usage: "/context", help: "Open the live context viewer", kind: Kind::Context },
    CommandSpec { name: "/transcribe", usage: "/transcribe [url]", help: "Transcribe a video into a document", kind: Kind::Transcribe },
    CommandSpec { name: "/progress", usage: "/progress", help: "Show a progress spinner", kind: Kind::Progress },
    CommandSpec { name: "/load", usage: "/load <name>", help: "Load a saved session", kind: Kind::Load },
    CommandSpec { name: "/help", usage: "/help", help: "List commands", kind: Kind::Help },
    CommandSpec { name: "/quit", usage: "/quit", help: "Exit without saving", kind: Kind::Quit },
    CommandSpec { name: "/exit", usage: "/exit", help: "Exit without saving", kind: Kind::Quit },
];

/// Classify a line typed at the prompt.
pub fn parse_input(line: &str) -> Result<Input, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Input::Blank);
    }
    if !trimmed.starts_with('/') {
        return Ok(Input::Chat(trimmed.to_string()));
    }
    parse_command(trimmed).map(Input::Command)
}

fn parse_command(input: &str) -> Result<Command, InputError> {
    let (spec, argument) = COMMANDS
        .iter()
        .find_map(|spec| match_name(input, spec.name).map(|rest| (spec, rest)))
        .ok_or_else(|| {
            let word = input.split_whitespace().next().unwrap_or(input);
            InputError::UnknownCommand(word.to_string())
        })?;
    let argument = Some(argument.trim()).filter(|a| !a.is_empty());

    let command = match spec.kind {
        Kind::New => match argument {
            Some(name) if !is_valid_session_name(name) => {
                return Err(InputError::InvalidSessionName(name.to_string()))
            }
            name => Command::New(name.map(String::from)),
        },
        Kind::Load => match argument {
            None => return Err(InputError::MissingArgument(spec.usage)),
            Some(name) if !is_valid_session_name(name) => {
                return Err(InputError::InvalidSessionName(name.to_string()))
            }
            Some(name) => Command::Load(name.to_string()),
        },
        Kind::Transcribe => Command::Transcribe(argument.map(String::from)),
        Kind::Clear => Command::Clear,
        Kind::Save => Command::Save,
        Kind::Export => Command::Export,
        Kind::Compact => Command::Compact,
        Kind::Model => Command::Model,
        Kind::Context => Command::Context,
        Kind::Progress => Command::Progress,
        Kind::Help => Command::Help,
        Kind::Quit => Command::Quit,
    };
    Ok(command)
}

/// The remainder after `name` if `input` starts with it at a word boundary.
fn match_name<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(name)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
}

/// `/help` text.
pub fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|spec| format!("  {:<20} {}", spec.usage, spec.help))
        .collect::<Vec<_>>()
        .join("\n")
}
