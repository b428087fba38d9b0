//! Clients for the external music services the enrichment pipeline consumes.

mod genius;
mod spotify;
mod youtube;

pub use genius::{extract_lyrics, GeniusClient, LyricsLookup, LyricsProvider, DEFAULT_GENIUS_API_BASE};
pub use spotify::{
    AccessTokenCache, SpotifyApi, SpotifyClient, SpotifyTrack, DEFAULT_SPOTIFY_ACCOUNTS_BASE,
    DEFAULT_SPOTIFY_API_BASE,
};
pub use youtube::{VideoSearch, YouTubeClient, DEFAULT_YOUTUBE_API_BASE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{service} connection error: {message}")]
    Connection {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} has no {what}")]
    NotFound {
        service: &'static str,
        what: String,
    },

    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub(crate) fn connection(service: &'static str, err: reqwest::Error) -> Self {
        ProviderError::Connection {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid(service: &'static str, message: impl ToString) -> Self {
        ProviderError::InvalidResponse {
            service,
            message: message.to_string(),
        }
    }
}
