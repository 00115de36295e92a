//! Scripted provider for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::header;
use axum::routing::post;
use axum::Router;

use super::{Provider, ProviderError, ReplyStream};
use crate::models::Message;

/// Provider whose answers are fixed up front and whose calls are counted.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    /// Reply for `get_completion`; `None` makes the call fail.
    pub completion: Option<String>,
    /// Fragments yielded by `stream_completion`.
    pub fragments: Vec<String>,
    /// Yield a stream error after this many fragments.
    pub fail_stream_after: Option<usize>,
    pub completion_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
    pub last_history: Mutex<Vec<Message>>,
}

impl ScriptedProvider {
    pub fn completing(reply: &str) -> Self {
        Self {
            completion: Some(reply.to_string()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn short_name(&self) -> &str {
        "scripted"
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["scripted-large".to_string(), "scripted-mini".to_string()])
    }

    fn cheapest_model(&self) -> &str {
        "scripted-mini"
    }

    async fn get_completion(&self, _model: &str, prompt: &str) -> Result<String, ProviderError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        self.completion
            .clone()
            .ok_or_else(|| ProviderError::Status {
                status: 500,
                message: "scripted failure".to_string(),
            })
    }

    async fn stream_completion(
        &self,
        _model: &str,
        messages: &[Message],
    ) -> Result<ReplyStream, ProviderError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_history.lock().unwrap() = messages.to_vec();

        let mut items: Vec<Result<String, ProviderError>> = Vec::new();
        for (index, fragment) in self.fragments.iter().enumerate() {
            if self.fail_stream_after == Some(index) {
                items.push(Err(ProviderError::Stream("connection reset".to_string())));
                break;
            }
            items.push(Ok(fragment.clone()));
        }
        Ok(Box::pin(tokio_stream::iter(items)))
    }
}

/// Serve `body` as the SSE response of `POST /chat/completions` on a local
/// port, then close the connection. Returns the base URL.
pub async fn serve_sse(body: String) -> String {
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let body = body.clone();
            async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}
