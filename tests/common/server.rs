//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own collection database and
//! fresh fakes for every external service.

use super::constants::*;
use super::fakes::{FakeGemini, FakeLyrics, FakeSpotify};
use nucleus_server::analysis::ContentAnalyzer;
use nucleus_server::chat::{ChatService, ChatSettings};
use nucleus_server::collection_store::{CollectionStore, SqliteCollectionStore};
use nucleus_server::credentials::{ApiKey, CredentialPool};
use nucleus_server::enrichment::{
    AnalysisFallback, BatchEnrichmentController, BatchSettings, TrackEnrichmentPipeline,
};
use nucleus_server::llm::{CompletionOptions, LlmProvider};
use nucleus_server::providers::{LyricsProvider, SpotifyApi};
use nucleus_server::server::{make_app, AppParts, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated collection database
///
/// When dropped, the server gracefully shuts down and the temp directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Direct access to the collection, bypassing HTTP
    pub store: Arc<dyn CollectionStore>,

    /// The fake model, for inspecting what was sent to it
    pub gemini: Arc<FakeGemini>,

    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound or
    /// the server does not become ready in time.
    pub async fn spawn() -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store: Arc<dyn CollectionStore> = Arc::new(
            SqliteCollectionStore::new(temp_db_dir.path().join("collection.db"))
                .expect("Failed to open collection store"),
        );

        let gemini = Arc::new(FakeGemini::default());
        let llm: Arc<dyn LlmProvider> = gemini.clone();
        let keys = Arc::new(
            CredentialPool::new("gemini", GEMINI_KEYS.iter().map(|k| ApiKey::new(*k)).collect())
                .expect("Failed to build key pool"),
        );
        let spotify: Arc<dyn SpotifyApi> = Arc::new(FakeSpotify);
        let lyrics: Arc<dyn LyricsProvider> = Arc::new(FakeLyrics);

        let analyzer = Arc::new(ContentAnalyzer::new(
            llm.clone(),
            keys.clone(),
            CompletionOptions::default(),
        ));
        let pipeline = Arc::new(TrackEnrichmentPipeline::new(
            store.clone(),
            spotify.clone(),
            Some(lyrics),
            analyzer,
            AnalysisFallback::None,
            NUCLEUS_REFRESH_EVERY,
        ));
        let batch_controller = Arc::new(BatchEnrichmentController::new(
            pipeline.clone(),
            spotify,
            BatchSettings::default(),
        ));
        let chat = Arc::new(ChatService::new(
            store.clone(),
            llm,
            keys,
            CompletionOptions::default(),
            ChatSettings::default(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };
        let app = make_app(
            config,
            AppParts {
                store: store.clone(),
                pipeline: Some(pipeline),
                batch_controller: Some(batch_controller),
                chat,
                video_search: None,
                hash: "e2e".to_string(),
            },
        );

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            store,
            gemini,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Polls the home endpoint until it answers
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
