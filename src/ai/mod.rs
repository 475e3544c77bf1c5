//! LLM transport abstraction and the AI-backed pipeline stages.
//!
//! [`LlmTransport`] decouples the refiner, reviewer, and fixer from the
//! HTTP layer so tests can inject scripted implementations. The production
//! transport is [`anthropic::AnthropicTransport`].

pub mod anthropic;
mod refine;
mod review;

pub use review::FixPatch;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors from LLM-backed stages.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    #[error("API key is not configured")]
    MissingKey,
}

/// Minimal contract the pipeline needs from an LLM service.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    /// Send a single user message and return the text completion.
    async fn send(&self, prompt: &str, max_tokens: u32) -> Result<String, AiError>;
}

/// AI-backed pipeline stages: group refinement, commit messages, review,
/// and fix generation. Thin stateless wrapper over a shared transport.
#[derive(Clone)]
pub struct AiClient {
    transport: Arc<dyn LlmTransport>,
}

impl AiClient {
    pub fn new(transport: Arc<dyn LlmTransport>) -> Self {
        Self { transport }
    }

    pub(crate) async fn send(&self, prompt: &str, max_tokens: u32) -> Result<String, AiError> {
        self.transport.send(prompt, max_tokens).await
    }
}

/// Remove markdown code fences the model sometimes wraps around JSON.
pub(crate) fn strip_code_fences(s: &str) -> &str {
    let mut s = s.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    s.trim().trim_end_matches("```").trim()
}

/// Shorten a string for error messages.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
