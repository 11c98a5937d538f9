//! Anthropic Messages API backend.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{GenerationError, Generator};
use crate::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Client for `POST /v1/messages`.
#[derive(Debug, Clone)]
pub struct AnthropicGenerator {
    http_client: Client,
    url: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [RequestMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl AnthropicGenerator {
    /// Build a client from config. Fails when no API key is configured.
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| GenerationError::Transport(format!("invalid API key header: {e}")))?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            url: config.messages_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn map_transport(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(err.to_string())
    }
}

/// Pull the reply text out of a successful response body.
fn parse_reply(body: &str) -> Result<String, GenerationError> {
    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    if let Some(usage) = &response.usage {
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
            "anthropic usage"
        );
    }

    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text.to_string())
}

fn status_error(status: StatusCode, body: &str) -> GenerationError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    GenerationError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        debug!(model = %self.model, "requesting generation");

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: [RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_reply(&body)
    }
}
