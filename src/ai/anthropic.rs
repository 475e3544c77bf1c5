//! HTTP transport for the Anthropic Messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AiError, LlmTransport};
use crate::constants;

/// Request body for the Messages API.
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response body from the Messages API.
#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Production [`LlmTransport`] backed by the Anthropic Messages API.
pub struct AnthropicTransport {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicTransport {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmTransport for AnthropicTransport {
    async fn send(&self, prompt: &str, max_tokens: u32) -> Result<String, AiError> {
        if self.api_key.trim().is_empty() {
            return Err(AiError::MissingKey);
        }

        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(constants::ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", constants::ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AiError::Api(format!(
                "API returned status {status}: {}",
                super::truncate(&text, 200)
            )));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| AiError::Parse(format!("{e} (raw: {})", super::truncate(&text, 200))))?;

        if let Some(err) = parsed.error {
            return Err(AiError::Api(err.message));
        }

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| AiError::Api("no text content in response".to_string()))
    }
}
