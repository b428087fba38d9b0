use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nucleus_server::analysis::ContentAnalyzer;
use nucleus_server::chat::ChatService;
use nucleus_server::collection_store::{CollectionStore, SqliteCollectionStore};
use nucleus_server::config::{AppConfig, CliConfig, FileConfig};
use nucleus_server::credentials::{ApiKey, CredentialPool};
use nucleus_server::enrichment::{BatchEnrichmentController, TrackEnrichmentPipeline};
use nucleus_server::llm::{CompletionOptions, GeminiProvider, LlmProvider};
use nucleus_server::providers::{
    GeniusClient, LyricsProvider, SpotifyApi, SpotifyClient, VideoSearch, YouTubeClient,
};
use nucleus_server::server::{self, AppParts, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the collection database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    #[clap(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: Option<String>,

    #[clap(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    /// Without it, lyrics are not fetched and the analysis fallback applies.
    #[clap(long, env = "GENIUS_ACCESS_TOKEN", hide_env_values = true)]
    pub genius_access_token: Option<String>,

    /// Comma separated, tried in order on every call.
    #[clap(
        long,
        env = "GEMINI_API_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub gemini_api_keys: Vec<String>,

    #[clap(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    /// What to analyze when no lyrics provider is configured.
    #[clap(long, value_enum, default_value = "none")]
    pub analysis_fallback: nucleus_server::enrichment::AnalysisFallback,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            spotify_client_id: self.spotify_client_id.clone(),
            spotify_client_secret: self.spotify_client_secret.clone(),
            genius_access_token: self.genius_access_token.clone(),
            gemini_api_keys: self.gemini_api_keys.clone(),
            youtube_api_key: self.youtube_api_key.clone(),
            analysis_fallback: self.analysis_fallback,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let db_path = config.collection_db_path();
    info!("Opening SQLite collection database at {:?}...", db_path);
    let store: Arc<dyn CollectionStore> = Arc::new(SqliteCollectionStore::new(&db_path)?);
    server::metrics::set_collection_size(store.count_tracks()?);

    let gemini = &config.gemini;
    let llm: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(&gemini.base_url, &gemini.model));
    let gemini_keys = Arc::new(CredentialPool::new(
        "gemini",
        gemini.api_keys.iter().map(ApiKey::new).collect(),
    )?);
    info!(
        "Using {} with {} API key(s)",
        gemini.model,
        gemini_keys.len()
    );
    let base_options = CompletionOptions {
        temperature: gemini.temperature,
        timeout: gemini.timeout,
        ..Default::default()
    };

    let analyzer = Arc::new(ContentAnalyzer::new(
        llm.clone(),
        gemini_keys.clone(),
        base_options.clone(),
    ));

    let chat = Arc::new(ChatService::new(
        store.clone(),
        llm,
        gemini_keys,
        CompletionOptions {
            max_tokens: Some(gemini.chat_max_tokens),
            ..base_options
        },
        config.chat,
    ));

    let lyrics: Option<Arc<dyn LyricsProvider>> = match &config.genius {
        Some(genius) => Some(Arc::new(GeniusClient::new(
            &genius.api_base,
            ApiKey::new(&genius.access_token),
        )?)),
        None => {
            warn!(
                "No Genius token configured, analysis fallback is {:?}",
                config.enrichment.analysis_fallback
            );
            None
        }
    };

    let (pipeline, batch_controller) = match &config.spotify {
        Some(spotify) => {
            let spotify: Arc<dyn SpotifyApi> = Arc::new(SpotifyClient::new(
                &spotify.api_base,
                &spotify.accounts_base,
                &spotify.client_id,
                ApiKey::new(&spotify.client_secret),
            )?);
            let pipeline = Arc::new(TrackEnrichmentPipeline::new(
                store.clone(),
                spotify.clone(),
                lyrics,
                analyzer,
                config.enrichment.analysis_fallback,
                config.enrichment.nucleus_refresh_every,
            ));
            let controller = Arc::new(BatchEnrichmentController::new(
                pipeline.clone(),
                spotify,
                config.enrichment.batch,
            ));
            (Some(pipeline), Some(controller))
        }
        None => {
            warn!("Spotify is not configured, enrichment endpoints are disabled");
            (None, None)
        }
    };

    let video_search: Option<Arc<dyn VideoSearch>> = match &config.youtube {
        Some(youtube) => Some(Arc::new(YouTubeClient::new(
            &youtube.api_base,
            ApiKey::new(&youtube.api_key),
        )?)),
        None => None,
    };

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
        frontend_dir_path: config.frontend_dir_path.clone(),
        default_batch_target: config.enrichment.default_batch_target,
    };

    server::run_server(
        server_config,
        AppParts {
            store,
            pipeline,
            batch_controller,
            chat,
            video_search,
            hash: env!("GIT_HASH").to_string(),
        },
    )
    .await
}
