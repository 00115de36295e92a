//! OpenAI-compatible chat completions provider.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::sse::{SseEvent, SseParser};
use super::{Provider, ProviderError, ReplyStream};
use crate::models::Message;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHEAPEST_MODEL: &str = "gpt-4o-mini";

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for the `/models` and `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: Client,
    api_key: String,
    base_url: String,
    cheapest_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        cheapest_model: Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey("openai".to_string()));
        }

        Ok(Self {
            http: Client::builder().build()?,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            cheapest_model: cheapest_model.unwrap_or_else(|| DEFAULT_CHEAPEST_MODEL.to_string()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn post_chat(&self, request: &ChatRequest<'_>) -> Result<Response, ProviderError> {
        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        check_status(response).await
    }
}

/// Turn a non-2xx response into [`ProviderError::Status`].
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        message: parse_error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string()),
    })
}

fn parse_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(ToString::to_string)
}

/// Keep chat models only, sorted by id.
fn chat_models(list: ModelList) -> Vec<String> {
    let mut models: Vec<String> = list
        .data
        .into_iter()
        .map(|m| m.id)
        .filter(|id| id.contains("gpt"))
        .collect();
    models.sort();
    models
}

/// Parse the SSE body and forward fragments until `[DONE]`. A body that
/// ends without the terminator yields a trailing stream error.
async fn forward_events(response: Response, tx: mpsc::Sender<Result<String, ProviderError>>) {
    let mut bytes = Box::pin(response.bytes_stream());
    let mut parser = SseParser::default();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(ProviderError::Http(e))).await;
                return;
            }
        };

        for event in parser.feed(&chunk) {
            match event {
                SseEvent::Delta(text) => {
                    if tx.send(Ok(text)).await.is_err() {
                        return;
                    }
                }
                SseEvent::Done => return,
                SseEvent::Error(message) => {
                    let _ = tx.send(Err(ProviderError::Stream(message))).await;
                    return;
                }
            }
        }
    }

    let reason = if parser.is_empty_buffer() {
        "stream ended before [DONE]"
    } else {
        "stream ended mid-frame before [DONE]"
    };
    tracing::warn!("{reason}");
    let _ = tx.send(Err(ProviderError::Stream(reason.to_string()))).await;
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn short_name(&self) -> &str {
        "openai"
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let list: ModelList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(chat_models(list))
    }

    fn cheapest_model(&self) -> &str {
        &self.cheapest_model
    }

    async fn get_completion(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let messages = [Message::user(prompt)];
        let request = ChatRequest {
            model,
            messages: &messages,
            temperature: Some(0.0),
            stream: false,
        };

        let response: ChatResponse = self
            .post_chat(&request)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ProviderError::Decode("response has no message content".to_string()))
    }

    async fn stream_completion(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ReplyStream, ProviderError> {
        let request = ChatRequest {
            model,
            messages,
            temperature: None,
            stream: true,
        };
        let response = self.post_chat(&request).await?;
        tracing::debug!(model, history = messages.len(), "Reply stream opened");

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(forward_events(response, tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
