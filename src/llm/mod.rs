//! LLM provider abstraction and the Gemini backend.

mod gemini;
mod provider;
mod types;

pub use gemini::{GeminiProvider, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{Attachment, CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
