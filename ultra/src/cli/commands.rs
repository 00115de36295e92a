//! CLI command execution.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{config_path, ensure_api_key, Config, Paths};
use crate::context::{list_sessions, ContextManager};
use crate::logging::{init_logging, CHAT_LOG, VIEWER_LOG};
use crate::names::is_valid_session_name;
use crate::provider::{create_provider, Provider};
use crate::session::{select_model, ChatSession};
use crate::transcribe::{run_pipeline, Template};
use crate::ui;
use crate::viewer::{start_viewer, ViewerOptions};

use super::args::{Cli, Commands, SessionArgs};

/// How the chat picks its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelChoice {
    /// Banner, then a numbered list.
    Ask,
    /// The provider's cheapest model.
    Cheapest,
}

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        None => run_chat(&cli.session, ModelChoice::Ask).await,
        Some(Commands::Chat) => run_chat(&cli.session, ModelChoice::Cheapest).await,
        Some(Commands::Transcribe { url, template }) => transcribe_once(&cli.session, &url, template).await,
        Some(Commands::Sessions) => list_saved_sessions(&cli.session),
        Some(Commands::View {
            mirror,
            port,
            refresh_ms,
            open,
        }) => serve_viewer(&cli.session, &mirror, port, refresh_ms, open).await,
    }
}

/// Config file, working directory layout and logging for this run.
fn prepare(args: &SessionArgs, log_file: &str) -> Result<(Config, Paths)> {
    let config = Config::load()?;
    let paths = Paths::new(config.working_dir(args.working_dir.as_deref())?);
    paths.ensure()?;
    init_logging(&paths.logs, log_file)?;
    Ok((config, paths))
}

fn connect_provider(config: &mut Config) -> Result<Arc<dyn Provider>> {
    let kind = config.provider_kind()?;
    let api_key = ensure_api_key(config, &config_path()?, kind)?;
    let provider = create_provider(kind, api_key, &config.openai)?;
    Ok(provider)
}

async fn run_chat(args: &SessionArgs, choice: ModelChoice) -> Result<()> {
    let (mut config, paths) = prepare(args, CHAT_LOG)?;
    if let Some(name) = args.session.as_deref() {
        anyhow::ensure!(is_valid_session_name(name), "Invalid session name: {name}");
    }

    if choice == ModelChoice::Ask {
        ui::print_banner();
        println!("Welcome to Ultra CLI. Type /help for commands, /quit at any time to exit.\n");
    }

    let provider = connect_provider(&mut config)?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let model = match (&args.model, choice) {
        (Some(model), _) => model.clone(),
        (None, ModelChoice::Cheapest) => provider.cheapest_model().to_string(),
        (None, ModelChoice::Ask) => select_model(provider.as_ref(), &mut input)
            .await
            .context("Model selection failed")?,
    };
    ui::title(&format!("Ultra CLI - Chat with {model}"));

    let context = ContextManager::new(args.session.clone(), &paths.sessions);
    let mut session = ChatSession::new(
        provider,
        model,
        context,
        paths,
        config.labels.clone(),
        config.viewer.clone(),
    );
    session.run(&mut input).await
}

async fn transcribe_once(args: &SessionArgs, url: &str, template: Template) -> Result<()> {
    let (mut config, paths) = prepare(args, CHAT_LOG)?;
    let provider = connect_provider(&mut config)?;

    let document = run_pipeline(url, &paths, provider.as_ref(), template)
        .await
        .with_context(|| format!("Transcription of {url} failed"))?;
    ui::success(&format!("Document created: {}", document.display()));
    Ok(())
}

fn list_saved_sessions(args: &SessionArgs) -> Result<()> {
    let config = Config::load()?;
    let paths = Paths::new(config.working_dir(args.working_dir.as_deref())?);
    let sessions = list_sessions(&paths.sessions)?;

    if sessions.is_empty() {
        println!("No saved sessions in {}.", paths.sessions.display());
        return Ok(());
    }

    println!("{:<32} {:<10} {:<20}", "NAME", "MESSAGES", "MODIFIED");
    println!("{}", "-".repeat(62));
    for session in sessions {
        let modified = session
            .modified_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{:<32} {:<10} {:<20}",
            session.name, session.message_count, modified
        );
    }
    Ok(())
}

async fn serve_viewer(
    args: &SessionArgs,
    mirror: &Path,
    port: u16,
    refresh_ms: u64,
    open_browser: bool,
) -> Result<()> {
    prepare(args, VIEWER_LOG)?;
    start_viewer(ViewerOptions {
        mirror: mirror.to_path_buf(),
        port,
        refresh_ms,
        open_browser,
    })
    .await
}
