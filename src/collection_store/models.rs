//! Data models for the track collection, chat history and nucleus metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of emotion labels the analysis may assign to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Love,
    Surprise,
    Calm,
    Nostalgia,
}

impl Emotion {
    /// All labels, in canonical order.
    pub const ALL: [Emotion; 8] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Love,
        Emotion::Surprise,
        Emotion::Calm,
        Emotion::Nostalgia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Love => "love",
            Emotion::Surprise => "surprise",
            Emotion::Calm => "calm",
            Emotion::Nostalgia => "nostalgia",
        }
    }

    /// Exact, lowercase match only. Anything else is not an emotion label.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "joy" => Some(Emotion::Joy),
            "sadness" => Some(Emotion::Sadness),
            "anger" => Some(Emotion::Anger),
            "fear" => Some(Emotion::Fear),
            "love" => Some(Emotion::Love),
            "surprise" => Some(Emotion::Surprise),
            "calm" => Some(Emotion::Calm),
            "nostalgia" => Some(Emotion::Nostalgia),
            _ => None,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An enriched track as persisted in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Local sequential id, assigned on insert.
    pub id: i64,
    /// Spotify track id, unique across the collection.
    pub spotify_id: String,
    pub source_url: String,
    pub title: String,
    pub artist: Option<String>,
    pub lyrics: Option<String>,
    pub lyrics_url: Option<String>,
    pub emotion: Emotion,
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub tempo: Option<i64>,
    pub genre: Option<String>,
    pub mood_description: Option<String>,
    pub dominant_instruments: Option<String>,
    pub vocal_characteristics: Option<String>,
    pub duration_ms: i64,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub has_preview: bool,
    /// Unix milliseconds, assigned on insert and never changed.
    pub added_at: i64,
}

/// A fully assembled track that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub spotify_id: String,
    pub source_url: String,
    pub title: String,
    pub artist: Option<String>,
    pub lyrics: Option<String>,
    pub lyrics_url: Option<String>,
    pub emotion: Emotion,
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub tempo: Option<i64>,
    pub genre: Option<String>,
    pub mood_description: Option<String>,
    pub dominant_instruments: Option<String>,
    pub vocal_characteristics: Option<String>,
    pub duration_ms: i64,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
}

/// Result of inserting a track.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Track),
    /// The spotify id was already present; carries the existing row untouched.
    Duplicate(Track),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// One persisted chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub role: ChatRole,
    pub content: String,
    /// `None` is the global nucleus conversation.
    pub channel: Option<Emotion>,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// The singleton aggregate describing the whole collection.
///
/// Derived from the tracks; it can be recomputed at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NucleusMetadata {
    pub name: String,
    pub description: Option<String>,
    pub dominant_emotion: Option<Emotion>,
    pub updated_at: i64,
}
