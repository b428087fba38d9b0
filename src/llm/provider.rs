//! LLM provider trait definition.

use super::types::{CompletionResponse, Message};
use crate::credentials::ApiKey;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Options for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Ask the provider to answer with a JSON document.
    pub json_response: bool,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: None,
            json_response: false,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Errors that can occur when interacting with an LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A generative model backend.
///
/// The credential is passed per call so that callers can rotate through a
/// [`CredentialPool`](crate::credentials::CredentialPool).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Complete a conversation. System messages become the provider's system
    /// instruction; the remaining messages are sent in order.
    async fn complete(
        &self,
        api_key: &ApiKey,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError>;
}
