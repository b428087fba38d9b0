mod file_config;

pub use file_config::{
    ChatConfig, EnrichmentConfig, FileConfig, GeminiConfig, GeniusConfig, SpotifyConfig,
    YouTubeConfig,
};

use crate::chat::ChatSettings;
use crate::enrichment::{AnalysisFallback, BatchSettings};
use crate::llm::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::providers::{
    DEFAULT_GENIUS_API_BASE, DEFAULT_SPOTIFY_ACCOUNTS_BASE, DEFAULT_SPOTIFY_API_BASE,
    DEFAULT_YOUTUBE_API_BASE,
};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub genius_access_token: Option<String>,
    pub gemini_api_keys: Vec<String>,
    pub youtube_api_key: Option<String>,
    pub analysis_fallback: AnalysisFallback,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Providers. Spotify, Genius and YouTube are optional: their absence
    // disables or downgrades the features that need them.
    pub spotify: Option<SpotifySettings>,
    pub genius: Option<GeniusSettings>,
    pub gemini: GeminiSettings,
    pub youtube: Option<YouTubeSettings>,

    // Feature configs (with defaults)
    pub enrichment: EnrichmentSettings,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub accounts_base: String,
}

#[derive(Debug, Clone)]
pub struct GeniusSettings {
    pub access_token: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_keys: Vec<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub chat_max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct YouTubeSettings {
    pub api_key: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub analysis_fallback: AnalysisFallback,
    pub default_batch_target: usize,
    pub batch: BatchSettings,
    pub nucleus_refresh_every: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            analysis_fallback: AnalysisFallback::None,
            default_batch_target: 10,
            batch: BatchSettings::default(),
            nucleus_refresh_every: 5,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // Spotify - both halves of the client credentials are needed
        let spotify_file = file.spotify.unwrap_or_default();
        let client_id = non_empty(spotify_file.client_id.or_else(|| cli.spotify_client_id.clone()));
        let client_secret = non_empty(
            spotify_file
                .client_secret
                .or_else(|| cli.spotify_client_secret.clone()),
        );
        let spotify = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(SpotifySettings {
                client_id,
                client_secret,
                api_base: spotify_file
                    .api_base
                    .unwrap_or_else(|| DEFAULT_SPOTIFY_API_BASE.to_string()),
                accounts_base: spotify_file
                    .accounts_base
                    .unwrap_or_else(|| DEFAULT_SPOTIFY_ACCOUNTS_BASE.to_string()),
            }),
            (None, None) => None,
            _ => bail!("Both the Spotify client id and client secret must be provided"),
        };

        let genius_file = file.genius.unwrap_or_default();
        let genius = non_empty(
            genius_file
                .access_token
                .or_else(|| cli.genius_access_token.clone()),
        )
        .map(|access_token| GeniusSettings {
            access_token,
            api_base: genius_file
                .api_base
                .unwrap_or_else(|| DEFAULT_GENIUS_API_BASE.to_string()),
        });

        // Gemini - the only analysis and chat backend, so at least one key
        let gemini_file = file.gemini.unwrap_or_default();
        let api_keys: Vec<String> = gemini_file
            .api_keys
            .unwrap_or_else(|| cli.gemini_api_keys.clone())
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if api_keys.is_empty() {
            bail!("At least one Gemini API key must be configured via --gemini-api-keys or [gemini].api_keys");
        }
        let gemini = GeminiSettings {
            api_keys,
            model: gemini_file
                .model
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: gemini_file
                .base_url
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            temperature: gemini_file.temperature.unwrap_or(0.4),
            timeout: Duration::from_secs(gemini_file.timeout_secs.unwrap_or(60)),
            chat_max_tokens: gemini_file.chat_max_tokens.unwrap_or(1024),
        };

        let youtube_file = file.youtube.unwrap_or_default();
        let youtube = non_empty(youtube_file.api_key.or_else(|| cli.youtube_api_key.clone())).map(
            |api_key| YouTubeSettings {
                api_key,
                api_base: youtube_file
                    .api_base
                    .unwrap_or_else(|| DEFAULT_YOUTUBE_API_BASE.to_string()),
            },
        );

        // Enrichment settings - merge file config with defaults
        let en_file = file.enrichment.unwrap_or_default();
        let analysis_fallback = match en_file.analysis_fallback {
            Some(s) => match AnalysisFallback::from_str(&s, true) {
                Ok(fallback) => fallback,
                Err(_) => bail!("Unknown analysis_fallback: {}", s),
            },
            None => cli.analysis_fallback,
        };
        let defaults = EnrichmentSettings::default();
        let enrichment = EnrichmentSettings {
            analysis_fallback,
            default_batch_target: en_file
                .default_batch_target
                .unwrap_or(defaults.default_batch_target),
            batch: BatchSettings {
                candidate_multiplier: en_file
                    .candidate_multiplier
                    .unwrap_or(defaults.batch.candidate_multiplier),
                max_candidates: en_file
                    .max_candidates
                    .unwrap_or(defaults.batch.max_candidates),
            },
            nucleus_refresh_every: en_file
                .nucleus_refresh_every
                .unwrap_or(defaults.nucleus_refresh_every),
        };

        let chat_file = file.chat.unwrap_or_default();
        let chat_defaults = ChatSettings::default();
        let chat = ChatSettings {
            history_window: chat_file
                .history_window
                .unwrap_or(chat_defaults.history_window),
            sample_tracks: chat_file
                .sample_tracks
                .unwrap_or(chat_defaults.sample_tracks),
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            spotify,
            genius,
            gemini,
            youtube,
            enrichment,
            chat,
        })
    }

    pub fn collection_db_path(&self) -> PathBuf {
        self.db_dir.join("collection.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
