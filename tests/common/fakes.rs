//! In-process stand-ins for Spotify, Genius and Gemini

use super::constants::*;
use async_trait::async_trait;
use nucleus_server::credentials::ApiKey;
use nucleus_server::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    MessageRole,
};
use nucleus_server::providers::{
    LyricsLookup, LyricsProvider, ProviderError, SpotifyApi, SpotifyTrack,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

fn catalog_entry(id: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    CATALOG.iter().find(|(track_id, _, _)| *track_id == id)
}

fn to_spotify_track(id: &str) -> Option<SpotifyTrack> {
    catalog_entry(id).map(|(id, title, _)| SpotifyTrack {
        id: id.to_string(),
        name: title.to_string(),
        artists: vec!["The Fixtures".to_string()],
        preview_url: Some(format!("https://p.scdn.co/mp3-preview/{}", id)),
        duration_ms: 180_000,
        image_url: Some(format!("https://i.scdn.co/image/{}", id)),
        spotify_url: format!("https://open.spotify.com/track/{}", id),
    })
}

fn listing(ids: &[&str], limit: usize) -> Vec<SpotifyTrack> {
    ids.iter()
        .filter_map(|id| to_spotify_track(id))
        .take(limit)
        .collect()
}

#[derive(Default)]
pub struct FakeSpotify;

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn get_track(&self, track_id: &str) -> Result<SpotifyTrack, ProviderError> {
        to_spotify_track(track_id).ok_or_else(|| ProviderError::NotFound {
            service: "spotify",
            what: format!("track {}", track_id),
        })
    }

    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> Result<Vec<SpotifyTrack>, ProviderError> {
        if playlist_id != PLAYLIST_ID {
            return Err(ProviderError::Status {
                service: "spotify",
                status: 404,
            });
        }
        Ok(listing(PLAYLIST_TRACKS, limit))
    }

    async fn get_top_tracks(
        &self,
        user_token: &str,
        limit: usize,
    ) -> Result<Vec<SpotifyTrack>, ProviderError> {
        if user_token != USER_TOKEN {
            return Err(ProviderError::Status {
                service: "spotify",
                status: 401,
            });
        }
        Ok(listing(TOP_TRACKS, limit))
    }

    async fn fetch_preview(&self, _preview_url: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(vec![0xff, 0xfb, 0x90, 0x00])
    }
}

#[derive(Default)]
pub struct FakeLyrics;

#[async_trait]
impl LyricsProvider for FakeLyrics {
    async fn search(
        &self,
        title: &str,
        _artist: Option<&str>,
    ) -> Result<LyricsLookup, ProviderError> {
        let entry = CATALOG.iter().find(|(_, t, _)| *t == title);
        match entry {
            Some((id, _, _)) if *id != NO_LYRICS_TRACK_ID => Ok(LyricsLookup {
                lyrics: Some(format!("verse about {}\nchorus about {}", title, title)),
                url: Some(format!("https://genius.com/{}", id)),
            }),
            _ => Ok(LyricsLookup::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub key: String,
    pub json_response: bool,
    pub messages: Vec<Message>,
}

/// Profiles catalog tracks with their table emotion and echoes chat turns.
///
/// Only [`GOOD_GEMINI_KEY`] is accepted; every call is recorded.
#[derive(Default)]
pub struct FakeGemini {
    pub requests: Mutex<Vec<RecordedRequest>>,
    /// Simulates a provider outage: every key fails.
    pub outage: AtomicBool,
}

impl FakeGemini {
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }

    pub fn chat_requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.json_response && r.key == GOOD_GEMINI_KEY)
            .cloned()
            .collect()
    }

    fn analysis_reply(messages: &[Message]) -> Option<String> {
        let prompt = messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .collect::<String>();
        let (_, title, emotion) = CATALOG.iter().find(|(_, title, _)| prompt.contains(title))?;
        Some(
            serde_json::json!({
                "emotion": emotion,
                "valence": if *emotion == "sadness" { 0.2 } else { 0.7 },
                "energy": 0.5,
                "tempo": 100,
                "genre": "indie",
                "mood_description": format!("{} feels like {}", title, emotion),
                "dominant_instruments": ["guitar", "drums"],
                "vocal_characteristics": "soft"
            })
            .to_string(),
        )
    }
}

#[async_trait]
impl LlmProvider for FakeGemini {
    fn name(&self) -> &str {
        "fake-gemini"
    }

    fn model(&self) -> &str {
        "fake-gemini-model"
    }

    async fn complete(
        &self,
        api_key: &ApiKey,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            key: api_key.expose().to_string(),
            json_response: options.json_response,
            messages: messages.to_vec(),
        });

        if self.outage.load(Ordering::SeqCst) {
            return Err(LlmError::RateLimited);
        }
        if api_key.expose() != GOOD_GEMINI_KEY {
            return Err(LlmError::Api {
                status: 403,
                message: "API key revoked".to_string(),
            });
        }

        let content = if options.json_response {
            Self::analysis_reply(messages)
                .ok_or_else(|| LlmError::InvalidResponse("unknown track".to_string()))?
        } else {
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            format!("I hear you: {}", last)
        };

        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }
}
