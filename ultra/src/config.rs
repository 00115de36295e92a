//! User configuration at `~/.ultra/config.json` and the working directory
//! layout derived from it.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::provider::{ProviderError, ProviderKind};

const CONFIG_DIR: &str = ".ultra";
const CONFIG_FILE: &str = "config.json";

/// Overrides the working directory when no `--working-dir` flag is given.
pub const WORKING_DIR_ENV: &str = "ULTRA_WORKING_DIR";

/// Contents of the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Registry key of the chat provider; `openai` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub openai: OpenAiConfig,
    pub viewer: ViewerConfig,
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheapest_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub refresh_interval_ms: u64,
    pub open_browser: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
            open_browser: true,
        }
    }
}

/// Names printed in front of each side of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub user: String,
    pub assistant: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            user: "You".to_string(),
            assistant: "Ultra".to_string(),
        }
    }
}

/// `~/.ultra`.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(CONFIG_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

impl Config {
    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Working directory: flag, then `ULTRA_WORKING_DIR`, then the config
    /// file, then `~/.ultra`.
    pub fn working_dir(&self, flag: Option<&Path>) -> Result<PathBuf> {
        let env = std::env::var(WORKING_DIR_ENV).ok();
        pick_working_dir(flag, env.as_deref(), self.working_dir.as_deref())
            .map_or_else(config_dir, Ok)
    }

    pub fn provider_kind(&self) -> Result<ProviderKind, ProviderError> {
        self.provider
            .as_deref()
            .map_or(Ok(ProviderKind::OpenAi), ProviderKind::parse)
    }

    /// API key for a provider: its environment variable, then the config file.
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        let env = std::env::var(kind.api_key_env()).ok();
        let configured = match kind {
            ProviderKind::OpenAi => self.openai.api_key.as_deref(),
        };
        pick_api_key(env.as_deref(), configured)
    }
}

fn pick_working_dir(flag: Option<&Path>, env: Option<&str>, configured: Option<&Path>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf)
        .or_else(|| env.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .or_else(|| configured.map(Path::to_path_buf))
}

fn pick_api_key(env: Option<&str>, configured: Option<&str>) -> Option<String> {
    [env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(String::from)
}

/// Resolve the API key, asking once on the terminal and saving the answer
/// to the config file when none is configured.
pub fn ensure_api_key(config: &mut Config, path: &Path, kind: ProviderKind) -> Result<String> {
    if let Some(key) = config.api_key(kind) {
        return Ok(key);
    }

    let stdin = std::io::stdin();
    let key = prompt_api_key(kind, &mut stdin.lock(), &mut std::io::stdout())?;
    match kind {
        ProviderKind::OpenAi => config.openai.api_key = Some(key.clone()),
    }
    config.save_to(path)?;
    tracing::info!(provider = %kind, "API key stored in {}", path.display());
    Ok(key)
}

fn prompt_api_key(kind: ProviderKind, input: &mut impl BufRead, output: &mut impl Write) -> Result<String> {
    write!(output, "Enter your API key for {kind}: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read API key")?;
    let key = line.trim();
    if key.is_empty() {
        bail!("No API key given for {kind}");
    }
    Ok(key.to_string())
}

/// Directory layout under the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub sessions: PathBuf,
    pub logs: PathBuf,
    pub audio: PathBuf,
    pub transcript: PathBuf,
    pub json: PathBuf,
    pub models: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            sessions: root.join("sessions"),
            logs: root.join("logs"),
            audio: root.join("audio"),
            transcript: root.join("transcript"),
            json: root.join("json"),
            models: root.join("models"),
            root,
        }
    }

    /// Create every directory.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.root,
            &self.sessions,
            &self.logs,
            &self.audio,
            &self.transcript,
            &self.json,
            &self.models,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
