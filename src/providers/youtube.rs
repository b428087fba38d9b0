//! YouTube Data API search, used only to find a playable video for a track.

use super::ProviderError;
use crate::credentials::ApiKey;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

const SERVICE: &str = "youtube";

#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Id of the best matching video, `None` when nothing matched.
    async fn search_video(&self, query: &str) -> Result<Option<String>, ProviderError>;
}

pub struct YouTubeClient {
    client: Client,
    api_base: String,
    api_key: ApiKey,
}

#[derive(Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

impl YouTubeClient {
    pub fn new(api_base: impl Into<String>, api_key: ApiKey) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    async fn search_video(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let url = format!(
            "{}/search?part=snippet&type=video&maxResults=1&q={}&key={}",
            self.api_base,
            urlencoding::encode(query),
            urlencoding::encode(self.api_key.expose())
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }

        let body: SearchListResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(SERVICE, e))?;
        Ok(body.items.into_iter().find_map(|item| item.id.video_id))
    }
}
