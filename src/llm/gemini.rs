//! Google Gemini `generateContent` provider.

use super::provider::{CompletionOptions, LlmError, LlmProvider};
use super::types::{Attachment, CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
use crate::credentials::ApiKey;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn build_request(messages: &[Message], options: &CompletionOptions) -> GeminiRequest {
        let system_text = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(GeminiContent::from)
            .collect();

        GeminiRequest {
            contents,
            system_instruction: (!system_text.is_empty()).then(|| GeminiSystemInstruction {
                parts: vec![GeminiPart::text(system_text)],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                response_mime_type: options
                    .json_response
                    .then(|| "application/json".to_string()),
            },
        }
    }

    fn parse_response(response: GeminiResponse) -> Result<CompletionResponse, LlmError> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No candidates in Gemini response".to_string())
        })?;

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") | None => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::MaxTokens,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST")
            | Some("PROHIBITED_CONTENT") => FinishReason::Blocked,
            Some(_) => FinishReason::Other,
        };

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse(format!(
                "Empty Gemini response (finish reason {:?})",
                finish_reason
            )));
        }

        let usage = response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        api_key: &ApiKey,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = Self::build_request(messages, options);

        debug!(
            model = %self.model,
            message_count = messages.len(),
            "Sending generateContent request to Gemini"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.expose())])
            .json(&request)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
        })?;

        let completion = Self::parse_response(gemini_response)?;
        debug!(
            finish_reason = ?completion.finish_reason,
            "Received completion response from Gemini"
        );
        Ok(completion)
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl From<&Message> for GeminiContent {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            MessageRole::Assistant => "model",
            MessageRole::User | MessageRole::System => "user",
        };

        let mut parts = Vec::with_capacity(1 + msg.attachments.len());
        if !msg.content.is_empty() {
            parts.push(GeminiPart::text(msg.content.clone()));
        }
        for attachment in &msg.attachments {
            match attachment {
                Attachment::InlineData { mime_type, data } => parts.push(GeminiPart {
                    text: None,
                    inline_data: Some(GeminiInlineData {
                        mime_type: mime_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(data),
                    }),
                }),
            }
        }

        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
