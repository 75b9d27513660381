use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::{BackendError, BackendResult, LlmProvider};
use crate::agent::Message;
use crate::http::HttpClient;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434/api/chat";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3:30b-a3b";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const ERROR_BODY_MAX_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    http: HttpClient,
    endpoint: String,
    model: String,
    temperature: f64,
    api_key: Option<String>,
}

impl OllamaProvider {
    /// Chat requests get a [`REQUEST_TIMEOUT`] ceiling whatever the wrapped client is configured with.
    pub fn new(http: HttpClient, endpoint: String, model: String, temperature: f64) -> Self {
        Self {
            http: http.with_request_timeout(REQUEST_TIMEOUT),
            endpoint,
            model,
            temperature,
            api_key: None,
        }
    }

    /// Bearer token for Ollama-compatible servers sitting behind an auth proxy.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_request_timeout(timeout);
        self
    }

    fn build_request<'a>(&'a self, messages: &'a [Message]) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| OllamaMessage {
                    role: message.role.wire_name(),
                    content: &message.content,
                })
                .collect(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        }
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> BackendResult<String> {
        let payload = self.build_request(messages);
        let response = self
            .http
            .post_json(&self.endpoint, self.api_key.as_deref(), &payload)
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Transport(err.to_string())
                }
            })?;

        if !(200..300).contains(&response.status) {
            let body = response
                .body
                .chars()
                .take(ERROR_BODY_MAX_CHARS)
                .collect::<String>();
            return Err(BackendError::HttpStatus {
                status: response.status,
                body,
            });
        }

        decode_reply(&response.body)
    }
}

/// Reads the reply text from either response shape: nested `message.content` first,
/// then a flat top-level `content`. A body carrying neither yields an empty reply.
pub fn decode_reply(body: &str) -> BackendResult<String> {
    let response = serde_json::from_str::<OllamaChatResponse>(body)
        .map_err(|err| BackendError::Parse(err.to_string()))?;

    match response {
        OllamaChatResponse {
            message: Some(OllamaReplyMessage {
                content: Some(content),
            }),
            ..
        } => Ok(content),
        OllamaChatResponse { content, .. } => Ok(content.unwrap_or_default()),
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaReplyMessage>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaReplyMessage {
    #[serde(default)]
    content: Option<String>,
}
