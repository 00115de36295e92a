//! The interactive chat loop.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_stream::StreamExt;

use crate::bridge::{BridgeOptions, ContextBridge};
use crate::config::{Labels, Paths, ViewerConfig};
use crate::context::ContextManager;
use crate::models::MessageRole;
use crate::provider::{Provider, ProviderError};
use crate::transcribe::{run_pipeline, Template};
use crate::ui::{self, Spinner};

use super::dispatch::{help_text, parse_input, Command, Input};

const PROGRESS_DEMO: Duration = Duration::from_secs(2);

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Dispatching,
    Sending,
    Streaming,
}

/// What the loop does after handling a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// One interactive session: a provider, a model and the current context.
pub struct ChatSession {
    provider: Arc<dyn Provider>,
    model: String,
    context: ContextManager,
    bridge: Option<ContextBridge>,
    paths: Paths,
    labels: Labels,
    viewer: ViewerConfig,
    state: SessionState,
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        context: ContextManager,
        paths: Paths,
        labels: Labels,
        viewer: ViewerConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            context,
            bridge: None,
            paths,
            labels,
            viewer,
            state: SessionState::AwaitingInput,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Read lines from `input` until `/quit` or end of input.
    pub async fn run<R>(&mut self, input: &mut Lines<R>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        tracing::info!(
            session = self.context.session_name(),
            model = %self.model,
            "Chat started"
        );
        loop {
            print!("{}", ui::user_prompt(&self.labels));
            std::io::stdout().flush()?;

            let Some(line) = input.next_line().await? else {
                println!();
                break;
            };
            if self.handle_line(&line, input).await? == Flow::Exit {
                break;
            }
        }
        tracing::info!(session = self.context.session_name(), "Chat ended");
        Ok(())
    }

    /// Handle one line of input. Errors returned here are terminal I/O
    /// failures; everything else is reported and the loop continues.
    pub async fn handle_line<R>(&mut self, line: &str, input: &mut Lines<R>) -> Result<Flow>
    where
        R: AsyncBufRead + Unpin,
    {
        let parsed = match parse_input(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                ui::error(&e.to_string());
                return Ok(Flow::Continue);
            }
        };

        match parsed {
            Input::Blank => Ok(Flow::Continue),
            Input::Chat(text) => {
                if let Err(e) = self.send(&text).await {
                    tracing::warn!("Provider call failed: {e}");
                    ui::error(&format!("Error from {}: {e}", self.provider.short_name()));
                }
                Ok(Flow::Continue)
            }
            Input::Command(command) => {
                self.state = SessionState::Dispatching;
                let flow = self.dispatch(command, input).await;
                self.state = SessionState::AwaitingInput;
                flow
            }
        }
    }

    /// Append the user message, stream the reply and append it once the
    /// stream is complete. A failed call leaves no assistant message.
    pub async fn send(&mut self, text: &str) -> Result<String, ProviderError> {
        self.context.append(MessageRole::User, text);
        let result = self.stream_reply().await;
        self.state = SessionState::AwaitingInput;

        let reply = result?;
        self.context.append(MessageRole::Assistant, reply.as_str());
        Ok(reply)
    }

    async fn stream_reply(&mut self) -> Result<String, ProviderError> {
        self.state = SessionState::Sending;
        let history = self.context.messages();

        let spinner = Spinner::start("Thinking...");
        let stream = self.provider.stream_completion(&self.model, &history).await;
        spinner.stop().await;
        let mut stream = stream?;

        self.state = SessionState::Streaming;
        println!();
        print!("{} ", ui::assistant_prompt(&self.labels));

        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(e) => {
                    println!();
                    return Err(e);
                }
            };
            print!("{fragment}");
            let _ = std::io::stdout().flush();
            reply.push_str(&fragment);
        }
        println!("\n");
        Ok(reply)
    }

    async fn dispatch<R>(&mut self, command: Command, input: &mut Lines<R>) -> Result<Flow>
    where
        R: AsyncBufRead + Unpin,
    {
        tracing::debug!(?command, "Dispatching command");
        match command {
            Command::New(name) => {
                // Dropping the bridge detaches the viewer from the old log.
                self.bridge = None;
                self.context = ContextManager::new(name, &self.paths.sessions);
                ui::success(&format!("New session started: {}", self.context.session_name()));
            }
            Command::Clear => {
                self.context.clear();
                ui::success("Context cleared!");
            }
            Command::Save => match self.context.save() {
                Ok(path) => ui::notice(&format!("Session saved to {}", path.display())),
                Err(e) => ui::error(&format!("Save failed: {e}")),
            },
            Command::Export => {
                ui::notice("Conversation exported as text:");
                println!("{}", self.context.export_text());
            }
            Command::Compact => {
                let spinner = Spinner::start("Compacting...");
                let result = self.context.compact(self.provider.as_ref()).await;
                spinner.stop().await;
                match result {
                    Ok(true) => ui::success("Context summarized/compacted!"),
                    Ok(false) => ui::notice("Nothing to compact."),
                    Err(e) => ui::error(&format!("Compaction failed: {e}")),
                }
            }
            Command::Model => {
                println!("Switching model...");
                match select_model(self.provider.as_ref(), input).await {
                    Ok(model) => {
                        ui::success(&format!("Now chatting with {model}"));
                        self.model = model;
                    }
                    Err(e) => ui::error(&format!("Model not changed: {e}")),
                }
            }
            Command::Context => self.attach_viewer(),
            Command::Transcribe(url) => self.transcribe(url, input).await?,
            Command::Progress => ui::progress_demo(PROGRESS_DEMO).await,
            Command::Load(name) => match self.context.switch_to(&name) {
                Ok(count) => ui::success(&format!("Loaded session {name} ({count} messages)")),
                Err(e) => ui::error(&format!("Could not load {name}: {e}")),
            },
            Command::Help => println!("Commands:\n{}", help_text()),
            Command::Quit => {
                println!("Goodbye!");
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    fn attach_viewer(&mut self) {
        let bridge = self.bridge.get_or_insert_with(|| {
            let options = BridgeOptions::from(&self.viewer).with_working_dir(&self.paths.root);
            ContextBridge::attach(&self.context, &options)
        });
        match bridge.viewer_url() {
            Some(url) => ui::success(&format!("Context viewer at {url}")),
            None => ui::notice(&format!(
                "Context mirrored to {} (viewer unavailable)",
                bridge.mirror_path().display()
            )),
        }
    }

    async fn transcribe<R>(&self, url: Option<String>, input: &mut Lines<R>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let url = match url {
            Some(url) => url,
            None => {
                print!("Enter the video URL: ");
                std::io::stdout().flush()?;
                match input.next_line().await? {
                    Some(line) if !line.trim().is_empty() => line.trim().to_string(),
                    _ => {
                        ui::error("No URL given.");
                        return Ok(());
                    }
                }
            }
        };

        match run_pipeline(&url, &self.paths, self.provider.as_ref(), Template::default()).await {
            Ok(document) => ui::success(&format!("Document created: {}", document.display())),
            Err(e) => {
                tracing::warn!(url = %url, "Transcription failed: {e}");
                ui::error(&format!("Transcription failed: {e}"));
            }
        }
        Ok(())
    }
}

/// List the provider's models and read a 1-based choice. Empty input picks
/// the first model; invalid input asks again.
pub async fn select_model<R>(provider: &dyn Provider, input: &mut Lines<R>) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    println!("\nListing available models...");
    let models = provider.list_models().await?;
    if models.is_empty() {
        bail!("{} returned no models", provider.short_name());
    }
    for (i, model) in models.iter().enumerate() {
        println!("{} - {model}", i + 1);
    }

    loop {
        print!("\nSelect a model number [1]: ");
        std::io::stdout().flush()?;
        let Some(line) = input.next_line().await? else {
            bail!("no model selected");
        };
        match parse_selection(&line, models.len()) {
            Some(index) => return Ok(models[index].clone()),
            None => ui::error(&format!("Enter a number between 1 and {}", models.len())),
        }
    }
}

/// 0-based index for a 1-based answer; blank means the first entry.
fn parse_selection(answer: &str, count: usize) -> Option<usize> {
    let answer = answer.trim();
    if answer.is_empty() {
        return (count > 0).then_some(0);
    }
    answer
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=count).contains(n))
        .map(|n| n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use crate::provider::mock::{serve_sse, ScriptedProvider};
    use crate::provider::OpenAiProvider;
    use tempfile::TempDir;
    use tokio::io::BufReader;

    type TestInput = Lines<BufReader<&'static [u8]>>;

    fn input(text: &'static str) -> TestInput {
        BufReader::new(text.as_bytes()).lines()
    }

    fn session(dir: &TempDir, provider: ScriptedProvider) -> (ChatSession, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let paths = Paths::new(dir.path());
        let context = ContextManager::new(Some("test".to_string()), &paths.sessions);
        let session = ChatSession::new(
            Arc::clone(&provider) as Arc<dyn Provider>,
            "scripted-large",
            context,
            paths,
            Labels::default(),
            ViewerConfig::default(),
        );
        (session, provider)
    }

    #[tokio::test]
    async fn test_chat_turn_appends_both_messages() {
        let dir = TempDir::new().unwrap();
        let (mut chat, provider) = session(&dir, ScriptedProvider::streaming(&["Hel", "lo", "!"]));

        let flow = chat.handle_line("hi there", &mut input("")).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            chat.context().messages(),
            vec![Message::user("hi there"), Message::assistant("Hello!")]
        );
        assert_eq!(*provider.last_history.lock().unwrap(), vec![Message::user("hi there")]);
        assert_eq!(chat.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_user_message_only() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider {
            fail_stream_after: Some(1),
            ..ScriptedProvider::streaming(&["partial", "never"])
        };
        let (mut chat, _) = session(&dir, provider);

        let flow = chat.handle_line("question", &mut input("")).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(chat.context().messages(), vec![Message::user("question")]);
        assert_eq!(chat.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        let body = format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": "Half an ans"}}]})
        );
        let base_url = serve_sse(body).await;
        let provider = OpenAiProvider::new("sk-test", Some(base_url), None).unwrap();
        let paths = Paths::new(dir.path());
        let context = ContextManager::new(Some("test".to_string()), &paths.sessions);
        let mut chat = ChatSession::new(
            Arc::new(provider),
            "gpt-4o-mini",
            context,
            paths,
            Labels::default(),
            ViewerConfig::default(),
        );

        assert!(matches!(chat.send("question").await, Err(ProviderError::Stream(_))));
        assert_eq!(chat.context().messages(), vec![Message::user("question")]);
    }

    #[tokio::test]
    async fn test_history_is_replayed_in_order() {
        let dir = TempDir::new().unwrap();
        let (mut chat, provider) = session(&dir, ScriptedProvider::streaming(&["ok"]));

        chat.send("one").await.unwrap();
        chat.send("two").await.unwrap();

        assert_eq!(
            *provider.last_history.lock().unwrap(),
            vec![Message::user("one"), Message::assistant("ok"), Message::user("two")]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let (mut chat, provider) = session(&dir, ScriptedProvider::streaming(&["x"]));

        chat.handle_line("/frobnicate", &mut input("")).await.unwrap();
        chat.handle_line("   ", &mut input("")).await.unwrap();

        assert_eq!(provider.stream_calls(), 0);
        assert!(chat.context().is_empty());
    }

    #[tokio::test]
    async fn test_clear_save_and_quit() {
        let dir = TempDir::new().unwrap();
        let (mut chat, _) = session(&dir, ScriptedProvider::streaming(&["reply"]));
        let mut lines = input("");

        chat.handle_line("hello", &mut lines).await.unwrap();
        chat.handle_line("/save", &mut lines).await.unwrap();
        assert!(dir.path().join("sessions").join("test.json").exists());

        chat.handle_line("/clear", &mut lines).await.unwrap();
        assert!(chat.context().is_empty());

        assert_eq!(chat.handle_line("/quit", &mut lines).await.unwrap(), Flow::Exit);
        assert_eq!(chat.handle_line("/exit", &mut lines).await.unwrap(), Flow::Exit);
    }

    #[tokio::test]
    async fn test_new_and_load_sessions() {
        let dir = TempDir::new().unwrap();
        let (mut chat, _) = session(&dir, ScriptedProvider::streaming(&["reply"]));
        let mut lines = input("");

        chat.handle_line("remember me", &mut lines).await.unwrap();
        chat.handle_line("/save", &mut lines).await.unwrap();

        chat.handle_line("/new scratch", &mut lines).await.unwrap();
        assert_eq!(chat.context().session_name(), "scratch");
        assert!(chat.context().is_empty());

        chat.handle_line("/load test", &mut lines).await.unwrap();
        assert_eq!(chat.context().session_name(), "test");
        assert_eq!(chat.context().len(), 2);

        chat.handle_line("/load missing", &mut lines).await.unwrap();
        assert_eq!(chat.context().session_name(), "test");
    }

    #[tokio::test]
    async fn test_compact_command() {
        let dir = TempDir::new().unwrap();
        let provider = ScriptedProvider {
            completion: Some("summary".to_string()),
            ..ScriptedProvider::streaming(&["reply"])
        };
        let (mut chat, provider) = session(&dir, provider);
        let mut lines = input("");

        chat.handle_line("/compact", &mut lines).await.unwrap();
        assert_eq!(provider.completion_calls(), 0);

        chat.handle_line("hello", &mut lines).await.unwrap();
        chat.handle_line("/compact", &mut lines).await.unwrap();
        assert_eq!(chat.context().messages(), vec![Message::system("summary")]);
    }

    #[tokio::test]
    async fn test_model_command_reads_selection() {
        let dir = TempDir::new().unwrap();
        let (mut chat, _) = session(&dir, ScriptedProvider::default());

        chat.handle_line("/model", &mut input("7\n2\n")).await.unwrap();
        assert_eq!(chat.model(), "scripted-mini");

        chat.handle_line("/model", &mut input("")).await.unwrap();
        assert_eq!(chat.model(), "scripted-mini");
    }

    #[tokio::test]
    async fn test_transcribe_without_url_at_end_of_input() {
        let dir = TempDir::new().unwrap();
        let (mut chat, provider) = session(&dir, ScriptedProvider::default());

        let flow = chat.handle_line("/transcribe", &mut input("")).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(provider.completion_calls(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_at_end_of_input() {
        let dir = TempDir::new().unwrap();
        let (mut chat, _) = session(&dir, ScriptedProvider::streaming(&["fine"]));

        chat.run(&mut input("how are you?\n\n")).await.unwrap();

        assert_eq!(
            chat.context().messages(),
            vec![Message::user("how are you?"), Message::assistant("fine")]
        );
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("", 3), Some(0));
        assert_eq!(parse_selection(" 2 ", 3), Some(1));
        assert_eq!(parse_selection("3", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("two", 3), None);
        assert_eq!(parse_selection("", 0), None);
    }
}
