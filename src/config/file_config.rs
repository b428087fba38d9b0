use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Providers
    pub spotify: Option<SpotifyConfig>,
    pub genius: Option<GeniusConfig>,
    pub gemini: Option<GeminiConfig>,
    pub youtube: Option<YouTubeConfig>,

    // Feature configs
    pub enrichment: Option<EnrichmentConfig>,
    pub chat: Option<ChatConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base: Option<String>,
    pub accounts_base: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GeniusConfig {
    pub access_token: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    /// Tried in order on every call.
    pub api_keys: Option<Vec<String>>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub chat_max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct YouTubeConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// "none", "audio_preview" or "embed_reference"
    pub analysis_fallback: Option<String>,
    pub default_batch_target: Option<usize>,
    pub candidate_multiplier: Option<usize>,
    pub max_candidates: Option<usize>,
    pub nucleus_refresh_every: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub history_window: Option<usize>,
    pub sample_tracks: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
