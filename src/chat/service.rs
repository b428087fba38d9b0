use super::context::{build_collection_context, CollectionStats};
use crate::collection_store::{ChatMessage, ChatRole, CollectionStore, Emotion};
use crate::credentials::{rotate, ApiKey, CredentialPool, RotationError};
use crate::llm::{CompletionOptions, LlmProvider, Message};
use crate::server::metrics;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    /// Prior turns sent along with a new message.
    pub history_window: usize,
    /// Tracks listed one by one in the collection context.
    pub sample_tracks: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            sample_tracks: 20,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error(transparent)]
    Provider(#[from] RotationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

fn channel_label(channel: Option<Emotion>) -> &'static str {
    channel.map_or("nucleus", |e| e.as_str())
}

/// Conversations with the collection, either as a whole (the nucleus channel)
/// or restricted to the tracks of one emotion.
pub struct ChatService {
    store: Arc<dyn CollectionStore>,
    provider: Arc<dyn LlmProvider>,
    credentials: Arc<CredentialPool<ApiKey>>,
    options: CompletionOptions,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        provider: Arc<dyn LlmProvider>,
        credentials: Arc<CredentialPool<ApiKey>>,
        options: CompletionOptions,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            provider,
            credentials,
            options: CompletionOptions {
                json_response: false,
                ..options
            },
            settings,
        }
    }

    /// Sends `text` on `channel` and stores both turns.
    ///
    /// The user turn is stored before the provider is called; when every
    /// credential fails it stays in history unanswered and the error is
    /// returned.
    pub async fn send(&self, channel: Option<Emotion>, text: &str) -> Result<ChatReply, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let tracks = match channel {
            None => self.store.list_tracks()?,
            Some(emotion) => self.store.list_tracks_with_emotion(emotion)?,
        };
        let stats = CollectionStats::compute(&tracks);
        let context = build_collection_context(&stats, &tracks, self.settings.sample_tracks);

        let history = self
            .store
            .recent_chat_messages(channel, self.settings.history_window)?;
        let user_message = self.store.append_chat_message(ChatRole::User, text, channel)?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(format!(
            "{}\n\n{}",
            self.persona(channel)?,
            context
        )));
        messages.extend(history.iter().map(|turn| match turn.role {
            ChatRole::User => Message::user(turn.content.clone()),
            ChatRole::Assistant => Message::assistant(turn.content.clone()),
        }));
        messages.push(Message::user(text));

        debug!(
            channel = channel_label(channel),
            history = history.len(),
            tracks = stats.total,
            "Sending chat turn"
        );

        let completion = match rotate(self.credentials.as_ref(), |key| {
            self.provider.complete(key, &messages, &self.options)
        })
        .await
        {
            Ok(completion) => completion,
            Err(err) => {
                warn!(channel = channel_label(channel), "Chat turn failed: {}", err);
                metrics::record_chat_turn(channel_label(channel), "failed");
                return Err(err.into());
            }
        };

        let assistant_message = self.store.append_chat_message(
            ChatRole::Assistant,
            completion.content.trim(),
            channel,
        )?;
        metrics::record_chat_turn(channel_label(channel), "ok");

        Ok(ChatReply {
            user_message,
            assistant_message,
        })
    }

    pub fn history(&self, channel: Option<Emotion>) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.store.list_chat_messages(channel)?)
    }

    pub fn clear(&self, channel: Option<Emotion>) -> Result<usize, ChatError> {
        Ok(self.store.clear_chat_messages(channel)?)
    }

    fn persona(&self, channel: Option<Emotion>) -> anyhow::Result<String> {
        Ok(match channel {
            None => {
                let nucleus = self.store.get_nucleus_metadata()?;
                let mut persona = format!(
                    "You are {}, the living core of a personal music collection. \
                     Speak in the first person as the collection itself, drawing only on the \
                     tracks and statistics below. Mention which emotions you hold and which \
                     you lack when it helps.",
                    nucleus.name
                );
                if let Some(description) = nucleus.description {
                    persona.push(' ');
                    persona.push_str(&description);
                }
                persona
            }
            Some(emotion) => format!(
                "You are the voice of {} inside a personal music collection. Answer as that \
                 feeling, drawing only on the {} tracks described below.",
                emotion, emotion
            ),
        })
    }
}
