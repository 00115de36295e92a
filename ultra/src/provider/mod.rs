//! Language-model provider abstraction.
//!
//! The context core only needs four things from a provider: the model list,
//! a designated cheap model, a blocking one-shot completion and a streaming
//! completion over the conversation history.

#[cfg(test)]
pub mod mock;
mod openai;
mod sse;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::config::OpenAiConfig;
use crate::models::Message;

pub use openai::OpenAiProvider;

/// Finite, non-restartable stream of reply fragments.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Errors surfaced by a provider. The core only propagates or reports them.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("reply stream failed: {0}")]
    Stream(String),

    #[error("no API key configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// A remote language-model API.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifier for the provider, e.g. `openai`.
    fn short_name(&self) -> &str;

    /// Models the user can pick from.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    /// Model used for compaction and transcript formatting.
    fn cheapest_model(&self) -> &str;

    /// Single blocking completion of one user prompt. The reply is trimmed.
    async fn get_completion(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;

    /// Stream a reply to the full conversation history.
    async fn stream_completion(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ReplyStream, ProviderError>;
}

/// Providers known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
}

impl ProviderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
        }
    }

    pub fn parse(key: &str) -> Result<Self, ProviderError> {
        match key {
            "openai" => Ok(Self::OpenAi),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    /// Environment variable that overrides the configured API key.
    pub const fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the provider registered under `kind`.
pub fn create_provider(
    kind: ProviderKind,
    api_key: String,
    config: &OpenAiConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    match kind {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::new(
            api_key,
            config.base_url.clone(),
            config.cheapest_model.clone(),
        )?)),
    }
}
