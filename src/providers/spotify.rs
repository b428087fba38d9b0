//! Spotify Web API client: track metadata, playlist expansion and top tracks.
//!
//! Catalog calls authenticate with the client-credentials flow; the resulting
//! token is held in an [`AccessTokenCache`] owned by the client.

use super::ProviderError;
use crate::credentials::ApiKey;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

const SERVICE: &str = "spotify";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const PLAYLIST_PAGE_SIZE: usize = 100;
const TOP_TRACKS_MAX: usize = 50;

/// Track metadata as consumed by the enrichment pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub preview_url: Option<String>,
    pub duration_ms: i64,
    pub image_url: Option<String>,
    pub spotify_url: String,
}

impl SpotifyTrack {
    /// All artist names joined for display, `None` when the track lists none.
    pub fn artist_line(&self) -> Option<String> {
        if self.artists.is_empty() {
            None
        } else {
            Some(self.artists.join(", "))
        }
    }
}

#[async_trait]
pub trait SpotifyApi: Send + Sync {
    async fn get_track(&self, track_id: &str) -> Result<SpotifyTrack, ProviderError>;

    /// Up to `limit` tracks of a playlist, in playlist order, skipping removed
    /// or unavailable slots.
    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> Result<Vec<SpotifyTrack>, ProviderError>;

    /// The top tracks of the user owning `user_token`.
    async fn get_top_tracks(
        &self,
        user_token: &str,
        limit: usize,
    ) -> Result<Vec<SpotifyTrack>, ProviderError>;

    /// Downloads a 30 second preview clip.
    async fn fetch_preview(&self, preview_url: &str) -> Result<Vec<u8>, ProviderError>;
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// A client-credentials access token with its expiry.
#[derive(Default)]
pub struct AccessTokenCache {
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, unless it is missing or expires within the refresh margin.
    pub fn get(&self, now: Instant) -> Option<String> {
        let cached = self.cached.lock().unwrap();
        cached
            .as_ref()
            .filter(|token| now + TOKEN_REFRESH_MARGIN < token.expires_at)
            .map(|token| token.value.clone())
    }

    pub fn store(&self, value: String, expires_in: Duration, now: Instant) {
        *self.cached.lock().unwrap() = Some(CachedToken {
            value,
            expires_at: now + expires_in,
        });
    }

    pub fn invalidate(&self) {
        *self.cached.lock().unwrap() = None;
    }
}

pub struct SpotifyClient {
    client: Client,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: ApiKey,
    token_cache: AccessTokenCache,
}

// Spotify API types

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SpotifyTrackJson {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    #[serde(default)]
    artists: Vec<SpotifyArtistJson>,
    preview_url: Option<String>,
    #[serde(default)]
    duration_ms: i64,
    album: Option<SpotifyAlbumJson>,
    external_urls: Option<SpotifyExternalUrls>,
}

#[derive(Deserialize)]
struct SpotifyArtistJson {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbumJson {
    #[serde(default)]
    images: Vec<SpotifyImageJson>,
}

#[derive(Deserialize)]
struct SpotifyImageJson {
    url: String,
}

#[derive(Deserialize)]
struct SpotifyExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistTracksPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrackJson>,
}

#[derive(Deserialize)]
struct TopTracksPage {
    #[serde(default)]
    items: Vec<SpotifyTrackJson>,
}

impl SpotifyTrackJson {
    /// `None` for local files, episodes and other slots without a catalog id.
    fn into_track(self) -> Option<SpotifyTrack> {
        if matches!(self.kind.as_deref(), Some(kind) if kind != "track") {
            return None;
        }
        let id = self.id.filter(|id| !id.is_empty())?;
        let spotify_url = self
            .external_urls
            .and_then(|u| u.spotify)
            .unwrap_or_else(|| format!("https://open.spotify.com/track/{}", id));
        Some(SpotifyTrack {
            name: self.name.unwrap_or_default(),
            artists: self.artists.into_iter().map(|a| a.name).collect(),
            preview_url: self.preview_url,
            duration_ms: self.duration_ms,
            image_url: self
                .album
                .and_then(|album| album.images.into_iter().next())
                .map(|image| image.url),
            spotify_url,
            id,
        })
    }
}

fn tracks_from_playlist_page(page: PlaylistTracksPage) -> Vec<SpotifyTrack> {
    page.items
        .into_iter()
        .filter_map(|item| item.track)
        .filter_map(SpotifyTrackJson::into_track)
        .collect()
}

impl SpotifyClient {
    pub fn new(
        api_base: impl Into<String>,
        accounts_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: ApiKey,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            accounts_base: accounts_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret,
            token_cache: AccessTokenCache::new(),
        })
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.token_cache.get(Instant::now()) {
            return Ok(token);
        }

        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(SERVICE, e))?;
        info!("Obtained Spotify access token, valid for {}s", token.expires_in);
        self.token_cache.store(
            token.access_token.clone(),
            Duration::from_secs(token.expires_in),
            Instant::now(),
        );
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: &str,
        what: &str,
    ) -> Result<T, ProviderError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| ProviderError::invalid(SERVICE, e)),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(ProviderError::NotFound {
                service: SERVICE,
                what: what.to_string(),
            }),
            StatusCode::UNAUTHORIZED => {
                self.token_cache.invalidate();
                Err(ProviderError::Status {
                    service: SERVICE,
                    status: 401,
                })
            }
            status => Err(ProviderError::Status {
                service: SERVICE,
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    async fn get_track(&self, track_id: &str) -> Result<SpotifyTrack, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}/tracks/{}", self.api_base, track_id);
        let what = format!("track {}", track_id);
        let track: SpotifyTrackJson = self.get_json(&url, &token, &what).await?;
        track
            .into_track()
            .ok_or_else(|| ProviderError::invalid(SERVICE, format!("{} has no catalog id", what)))
    }

    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> Result<Vec<SpotifyTrack>, ProviderError> {
        let token = self.access_token().await?;
        let what = format!("playlist {}", playlist_id);
        let mut tracks = Vec::new();
        let mut next_url = Some(format!(
            "{}/playlists/{}/tracks?limit={}&offset=0",
            self.api_base,
            playlist_id,
            limit.clamp(1, PLAYLIST_PAGE_SIZE)
        ));

        while let Some(url) = next_url.take() {
            if tracks.len() >= limit {
                break;
            }
            let page: PlaylistTracksPage = self.get_json(&url, &token, &what).await?;
            next_url = page.next.clone();
            tracks.extend(tracks_from_playlist_page(page));
        }

        tracks.truncate(limit);
        debug!("Playlist {} expanded to {} tracks", playlist_id, tracks.len());
        Ok(tracks)
    }

    async fn get_top_tracks(
        &self,
        user_token: &str,
        limit: usize,
    ) -> Result<Vec<SpotifyTrack>, ProviderError> {
        let url = format!(
            "{}/me/top/tracks?limit={}",
            self.api_base,
            limit.clamp(1, TOP_TRACKS_MAX)
        );
        let page: TopTracksPage = self.get_json(&url, user_token, "top tracks").await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(SpotifyTrackJson::into_track)
            .take(limit)
            .collect())
    }

    async fn fetch_preview(&self, preview_url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(preview_url)
            .send()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;
        debug!(
            "Downloaded preview clip ({:#})",
            byte_unit::Byte::from(bytes.len())
        );
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_cache_respects_refresh_margin() {
        let cache = AccessTokenCache::new();
        let now = Instant::now();
        assert_eq!(cache.get(now), None);

        cache.store("tok".to_string(), Duration::from_secs(3600), now);
        assert_eq!(cache.get(now), Some("tok".to_string()));
        assert_eq!(
            cache.get(now + Duration::from_secs(3600 - 61)),
            Some("tok".to_string())
        );
        assert_eq!(cache.get(now + Duration::from_secs(3600 - 60)), None);

        cache.invalidate();
        assert_eq!(cache.get(now), None);
    }

    #[test]
    fn track_json_conversion() {
        let json: SpotifyTrackJson = serde_json::from_value(json!({
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "type": "track",
            "name": "Never Gonna Give You Up",
            "artists": [{"name": "Rick Astley"}, {"name": "Guest"}],
            "preview_url": null,
            "duration_ms": 213573,
            "album": {"images": [{"url": "https://i.scdn.co/large"}, {"url": "https://i.scdn.co/small"}]},
            "external_urls": {"spotify": "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"}
        }))
        .unwrap();

        let track = json.into_track().unwrap();
        assert_eq!(track.id, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(track.artist_line().as_deref(), Some("Rick Astley, Guest"));
        assert_eq!(track.image_url.as_deref(), Some("https://i.scdn.co/large"));
        assert_eq!(track.preview_url, None);
        assert_eq!(track.duration_ms, 213573);
    }

    #[test]
    fn playlist_page_skips_removed_and_local_slots() {
        let page: PlaylistTracksPage = serde_json::from_value(json!({
            "items": [
                {"track": {"id": "a", "name": "A", "artists": [], "duration_ms": 1}},
                {"track": null},
                {"track": {"id": null, "name": "Local file", "artists": [], "duration_ms": 1}},
                {"track": {"id": "ep", "type": "episode", "name": "Podcast", "duration_ms": 1}},
                {"track": {"id": "b", "name": "B", "artists": [{"name": "X"}], "duration_ms": 2}}
            ],
            "next": null
        }))
        .unwrap();

        let tracks = tracks_from_playlist_page(page);
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(tracks[0].spotify_url, "https://open.spotify.com/track/a");
        assert_eq!(tracks[0].artist_line(), None);
    }
}
