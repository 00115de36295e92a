//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::transcribe::Template;

/// Ultra - chat with language models from the terminal
#[derive(Parser, Debug)]
#[command(name = "ultra")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by the interactive modes.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Directory for sessions, logs and transcripts (default: ~/.ultra)
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Name for the new session
    #[arg(long, global = true)]
    pub session: Option<String>,

    /// Model to chat with (skips model selection)
    #[arg(short, long, global = true)]
    pub model: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start chatting right away with the cheapest (or given) model
    Chat,

    /// Download a video, transcribe it and write a document
    Transcribe {
        /// Video URL
        url: String,

        /// Formatting style for the transcript
        #[arg(short, long, value_enum, default_value_t = Template::Exact)]
        template: Template,
    },

    /// List saved sessions
    Sessions,

    /// Serve the live context viewer (started by /context)
    #[command(hide = true)]
    View {
        /// Mirror snapshot file to display and edit
        #[arg(long)]
        mirror: PathBuf,

        /// Port to listen on
        #[arg(short, long)]
        port: u16,

        /// Page refresh interval in milliseconds
        #[arg(long, default_value = "1000")]
        refresh_ms: u64,

        /// Open browser automatically
        #[arg(long)]
        open: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["ultra", "--model", "gpt-4o"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.session.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_chat_with_global_options() {
        let cli = Cli::try_parse_from(["ultra", "chat", "--session", "work", "--working-dir", "/tmp/u"])
            .unwrap();
        assert!(matches!(cli.command, Some(Commands::Chat)));
        assert_eq!(cli.session.session.as_deref(), Some("work"));
        assert_eq!(cli.session.working_dir, Some(PathBuf::from("/tmp/u")));
    }

    #[test]
    fn test_transcribe_template() {
        let cli = Cli::try_parse_from(["ultra", "transcribe", "https://youtu.be/x", "-t", "speakers-v2"])
            .unwrap();
        match cli.command {
            Some(Commands::Transcribe { url, template }) => {
                assert_eq!(url, "https://youtu.be/x");
                assert_eq!(template, Template::SpeakersV2);
            }
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::try_parse_from(["ultra", "transcribe", "u"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Transcribe { template: Template::Exact, .. })
        ));
    }

    #[test]
    fn test_view_arguments() {
        let cli = Cli::try_parse_from([
            "ultra", "view", "--mirror", "/tmp/m.json", "--port", "4000", "--open",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::View { mirror, port, refresh_ms, open }) => {
                assert_eq!(mirror, PathBuf::from("/tmp/m.json"));
                assert_eq!(port, 4000);
                assert_eq!(refresh_ms, 1000);
                assert!(open);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
