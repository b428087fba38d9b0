use super::profile::{parse_analysis_response, AnalysisProfile};
use super::prompt::{build_analysis_messages, AnalysisSource};
use crate::credentials::{rotate, ApiKey, CredentialPool, RotationError};
use crate::llm::{CompletionOptions, LlmProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The provider answered, but not with a valid profile.
    #[error("Malformed analysis response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Exhausted(#[from] RotationError),
}

/// Profiles tracks with the AI provider, rotating across its credential pool.
pub struct ContentAnalyzer {
    provider: Arc<dyn LlmProvider>,
    credentials: Arc<CredentialPool<ApiKey>>,
    options: CompletionOptions,
}

impl ContentAnalyzer {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        credentials: Arc<CredentialPool<ApiKey>>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            provider,
            credentials,
            options: CompletionOptions {
                json_response: true,
                ..options
            },
        }
    }

    pub async fn analyze(&self, source: &AnalysisSource) -> Result<AnalysisProfile, AnalysisError> {
        let messages = build_analysis_messages(source);
        debug!(
            source = source.kind(),
            provider = self.provider.name(),
            "Requesting track analysis"
        );

        let completion = rotate(self.credentials.as_ref(), |key| {
            self.provider.complete(key, &messages, &self.options)
        })
        .await?;

        parse_analysis_response(&completion.content).map_err(|reason| {
            warn!("Discarding analysis response: {}", reason);
            AnalysisError::Malformed(reason)
        })
    }
}
