use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};

use tracing::{error, info, warn};

use crate::chat::{ChatError, ChatService};
use crate::collection_store::{CollectionStore, Emotion};
use crate::enrichment::{
    BatchEnrichmentController, BatchError, BatchRegistry, BatchReport, Candidate,
    EnrichmentOutcome, TrackEnrichmentPipeline,
};
use crate::orbit;
use crate::server::metrics;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{log_requests, state::*, ServerConfig};

pub const DEFAULT_ORBIT_COUNT: usize = 4;
pub const MAX_ORBIT_COUNT: usize = 64;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub tracks: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct EnrichTrackBody {
    pub url: String,
}

#[derive(Deserialize, Debug)]
struct EnrichPlaylistBody {
    pub url: String,
    pub target: Option<usize>,
    /// Lets the caller poll progress while the request is in flight.
    pub batch_id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SeedCollectionBody {
    pub access_token: String,
    pub target: Option<usize>,
    pub batch_id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatBody {
    pub message: String,
}

#[derive(Deserialize, Debug)]
struct OrbitQuery {
    pub count: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct VideoSearchQuery {
    pub q: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutcomeResponse {
    Success {
        track: crate::collection_store::Track,
    },
    Skipped {
        reason: String,
        track: crate::collection_store::Track,
    },
    Failed {
        reason: &'static str,
        message: String,
    },
}

impl From<EnrichmentOutcome> for OutcomeResponse {
    fn from(outcome: EnrichmentOutcome) -> Self {
        match outcome {
            EnrichmentOutcome::Success(track) => OutcomeResponse::Success { track },
            EnrichmentOutcome::Skipped { reason, track } => {
                OutcomeResponse::Skipped { reason, track }
            }
            EnrichmentOutcome::Failed(reason) => OutcomeResponse::Failed {
                reason: reason.code(),
                message: reason.to_string(),
            },
        }
    }
}

fn not_configured(what: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{} is not configured", what),
    )
        .into_response()
}

fn store_failure(err: anyhow::Error) -> Response {
    error!("Collection store failure: {:#}", err);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn parse_channel(raw: &str) -> Result<Emotion, Response> {
    Emotion::from_str(&raw.to_lowercase()).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown emotion channel: {}", raw),
        )
            .into_response()
    })
}

async fn home(State(state): State<ServerState>) -> Response {
    let tracks = match state.store.count_tracks() {
        Ok(count) => count,
        Err(err) => return store_failure(err),
    };
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        tracks,
    };
    Json(stats).into_response()
}

// =============================================================================
// Tracks
// =============================================================================

async fn post_track(
    State(pipeline): State<OptionalPipeline>,
    Json(body): Json<EnrichTrackBody>,
) -> Response {
    let Some(pipeline) = pipeline else {
        return not_configured("Spotify");
    };
    let outcome = pipeline.enrich(&Candidate::from_url(body.url)).await;
    Json(OutcomeResponse::from(outcome)).into_response()
}

async fn get_tracks(State(store): State<GuardedCollectionStore>) -> Response {
    match store.list_tracks() {
        Ok(tracks) => Json(tracks).into_response(),
        Err(err) => store_failure(err),
    }
}

async fn get_tracks_count(State(store): State<GuardedCollectionStore>) -> Response {
    match store.count_tracks() {
        Ok(count) => Json(serde_json::json!({ "count": count })).into_response(),
        Err(err) => store_failure(err),
    }
}

async fn get_track(State(store): State<GuardedCollectionStore>, Path(id): Path<i64>) -> Response {
    match store.get_track(id) {
        Ok(Some(track)) => Json(track).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => store_failure(err),
    }
}

async fn delete_track(
    State(store): State<GuardedCollectionStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.delete_track(id) {
        Ok(true) => {
            if let Ok(count) = store.count_tracks() {
                metrics::set_collection_size(count);
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => store_failure(err),
    }
}

// =============================================================================
// Batches
// =============================================================================

fn batch_response(result: Result<BatchReport, BatchError>) -> Response {
    match result {
        Ok(report) => Json(report).into_response(),
        Err(BatchError::InvalidUrl) => {
            (StatusCode::BAD_REQUEST, BatchError::InvalidUrl.to_string()).into_response()
        }
        Err(err @ BatchError::Listing(_)) => {
            warn!("Batch aborted: {}", err);
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}

fn new_batch_id(requested: Option<String>) -> String {
    requested
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Runs a batch on its own task so that it outlives a client disconnect.
async fn run_detached<F>(batch: F) -> Response
where
    F: std::future::Future<Output = Result<BatchReport, BatchError>> + Send + 'static,
{
    match tokio::spawn(batch).await {
        Ok(result) => batch_response(result),
        Err(err) => {
            error!("Batch task panicked: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn post_playlist(
    State(state): State<ServerState>,
    Json(body): Json<EnrichPlaylistBody>,
) -> Response {
    let Some(controller) = state.batch_controller.clone() else {
        return not_configured("Spotify");
    };
    let target = body.target.unwrap_or(state.config.default_batch_target);
    let batch_id = new_batch_id(body.batch_id);
    let progress = state.batches.register(&batch_id);

    run_detached(async move {
        controller
            .enrich_playlist(&body.url, target, &batch_id, &progress, &CancellationToken::new())
            .await
    })
    .await
}

async fn post_seed(
    State(state): State<ServerState>,
    Json(body): Json<SeedCollectionBody>,
) -> Response {
    let Some(controller) = state.batch_controller.clone() else {
        return not_configured("Spotify");
    };
    let target = body.target.unwrap_or(state.config.default_batch_target);
    let batch_id = new_batch_id(body.batch_id);
    let progress = state.batches.register(&batch_id);

    run_detached(async move {
        controller
            .seed_from_top_tracks(
                &body.access_token,
                target,
                &batch_id,
                &progress,
                &CancellationToken::new(),
            )
            .await
    })
    .await
}

async fn get_batch_progress(
    State(batches): State<GuardedBatchRegistry>,
    Path(id): Path<String>,
) -> Response {
    match batches.get(&id) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// =============================================================================
// Orbits
// =============================================================================

fn orbit_count(query: &OrbitQuery) -> Result<usize, Response> {
    let count = query.count.unwrap_or(DEFAULT_ORBIT_COUNT);
    if count > MAX_ORBIT_COUNT {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Orbit count must be at most {}", MAX_ORBIT_COUNT),
        )
            .into_response());
    }
    Ok(count)
}

async fn get_orbits(
    State(store): State<GuardedCollectionStore>,
    Query(query): Query<OrbitQuery>,
) -> Response {
    let count = match orbit_count(&query) {
        Ok(count) => count,
        Err(response) => return response,
    };
    match store.list_tracks() {
        Ok(tracks) => Json(orbit::assign(&tracks, count)).into_response(),
        Err(err) => store_failure(err),
    }
}

async fn get_orbit(
    State(store): State<GuardedCollectionStore>,
    Path(index): Path<usize>,
    Query(query): Query<OrbitQuery>,
) -> Response {
    let count = match orbit_count(&query) {
        Ok(count) => count,
        Err(response) => return response,
    };
    match store.list_tracks() {
        Ok(tracks) => match orbit::orbit_tracks(&tracks, count, index) {
            Some(orbit) => Json(orbit).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Err(err) => store_failure(err),
    }
}

// =============================================================================
// Chat
// =============================================================================

fn chat_failure(err: ChatError) -> Response {
    match err {
        ChatError::EmptyMessage => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        ChatError::Provider(_) => (StatusCode::BAD_GATEWAY, err.to_string()).into_response(),
        ChatError::Store(err) => store_failure(err),
    }
}

async fn send_chat(chat: &ChatService, channel: Option<Emotion>, message: &str) -> Response {
    match chat.send(channel, message).await {
        Ok(reply) => Json(serde_json::json!({
            "user_message": reply.user_message,
            "assistant_message": reply.assistant_message,
        }))
        .into_response(),
        Err(err) => chat_failure(err),
    }
}

async fn post_nucleus_chat(
    State(chat): State<GuardedChatService>,
    Json(body): Json<ChatBody>,
) -> Response {
    send_chat(&chat, None, &body.message).await
}

async fn get_nucleus_chat(State(chat): State<GuardedChatService>) -> Response {
    match chat.history(None) {
        Ok(history) => Json(history).into_response(),
        Err(err) => chat_failure(err),
    }
}

async fn delete_nucleus_chat(State(chat): State<GuardedChatService>) -> Response {
    match chat.clear(None) {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(err) => chat_failure(err),
    }
}

async fn post_channel_chat(
    State(chat): State<GuardedChatService>,
    Path(channel): Path<String>,
    Json(body): Json<ChatBody>,
) -> Response {
    match parse_channel(&channel) {
        Ok(emotion) => send_chat(&chat, Some(emotion), &body.message).await,
        Err(response) => response,
    }
}

async fn get_channel_chat(
    State(chat): State<GuardedChatService>,
    Path(channel): Path<String>,
) -> Response {
    let emotion = match parse_channel(&channel) {
        Ok(emotion) => emotion,
        Err(response) => return response,
    };
    match chat.history(Some(emotion)) {
        Ok(history) => Json(history).into_response(),
        Err(err) => chat_failure(err),
    }
}

async fn delete_channel_chat(
    State(chat): State<GuardedChatService>,
    Path(channel): Path<String>,
) -> Response {
    let emotion = match parse_channel(&channel) {
        Ok(emotion) => emotion,
        Err(response) => return response,
    };
    match chat.clear(Some(emotion)) {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(err) => chat_failure(err),
    }
}

// =============================================================================
// Nucleus and playback
// =============================================================================

async fn get_nucleus(State(store): State<GuardedCollectionStore>) -> Response {
    match store.get_nucleus_metadata() {
        Ok(nucleus) => Json(nucleus).into_response(),
        Err(err) => store_failure(err),
    }
}

async fn search_video(
    State(video_search): State<OptionalVideoSearch>,
    Query(query): Query<VideoSearchQuery>,
) -> Response {
    let Some(video_search) = video_search else {
        return not_configured("YouTube");
    };
    match video_search.search_video(&query.q).await {
        Ok(video_id) => Json(serde_json::json!({ "video_id": video_id })).into_response(),
        Err(err) => {
            warn!("Video search failed: {}", err);
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}

/// Everything the router needs beyond its configuration.
pub struct AppParts {
    pub store: Arc<dyn CollectionStore>,
    pub pipeline: Option<Arc<TrackEnrichmentPipeline>>,
    pub batch_controller: Option<Arc<BatchEnrichmentController>>,
    pub chat: Arc<ChatService>,
    pub video_search: OptionalVideoSearch,
    pub hash: String,
}

pub fn make_app(config: ServerConfig, parts: AppParts) -> Router {
    let state = ServerState {
        config: config.clone(),
        start_time: std::time::Instant::now(),
        hash: parts.hash,
        store: parts.store,
        pipeline: parts.pipeline,
        batch_controller: parts.batch_controller,
        batches: Arc::new(BatchRegistry::new()),
        chat: parts.chat,
        video_search: parts.video_search,
    };

    let api_routes: Router = Router::new()
        .route("/tracks", post(post_track).get(get_tracks))
        .route("/tracks/count", get(get_tracks_count))
        .route("/tracks/{id}", get(get_track).delete(delete_track))
        .route("/playlists", post(post_playlist))
        .route("/collection/seed", post(post_seed))
        .route("/batches/{id}/progress", get(get_batch_progress))
        .route("/orbits", get(get_orbits))
        .route("/orbits/{index}", get(get_orbit))
        .route("/nucleus", get(get_nucleus))
        .route("/youtube/search", get(search_video))
        .route(
            "/chat",
            post(post_nucleus_chat)
                .get(get_nucleus_chat)
                .delete(delete_nucleus_chat),
        )
        .route(
            "/chat/{emotion}",
            post(post_channel_chat)
                .get(get_channel_chat)
                .delete(delete_channel_chat),
        )
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .nest("/v1", api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(config: ServerConfig, parts: AppParts) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, parts);

    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatSettings;
    use crate::collection_store::SqliteCollectionStore;
    use crate::credentials::{ApiKey, CredentialPool};
    use crate::llm::{
        CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    };
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            _api_key: &ApiKey,
            messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<CompletionResponse, LlmError> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(CompletionResponse {
                content: format!("echo: {}", last),
                finish_reason: FinishReason::Stop,
                usage: None,
            })
        }
    }

    fn make_test_app() -> Router {
        let store: Arc<dyn CollectionStore> = Arc::new(SqliteCollectionStore::in_memory().unwrap());
        let chat = Arc::new(ChatService::new(
            store.clone(),
            Arc::new(EchoProvider),
            Arc::new(CredentialPool::new("gemini", vec![ApiKey::new("k")]).unwrap()),
            CompletionOptions::default(),
            ChatSettings::default(),
        ));
        make_app(
            ServerConfig::default(),
            AppParts {
                store,
                pipeline: None,
                batch_controller: None,
                chat,
                video_search: None,
                hash: "test".to_string(),
            },
        )
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[tokio::test]
    async fn home_reports_hash_and_size() {
        let app = make_test_app();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["hash"], "test");
        assert_eq!(body["tracks"], 0);
    }

    #[tokio::test]
    async fn unconfigured_providers_are_unavailable() {
        let app = make_test_app();
        let requests = vec![
            json_request(
                "POST",
                "/v1/tracks",
                serde_json::json!({ "url": "spotify:track:abc" }),
            ),
            json_request(
                "POST",
                "/v1/playlists",
                serde_json::json!({ "url": "spotify:playlist:abc" }),
            ),
            json_request(
                "POST",
                "/v1/collection/seed",
                serde_json::json!({ "access_token": "t" }),
            ),
            Request::builder()
                .uri("/v1/youtube/search?q=song")
                .body(Body::empty())
                .unwrap(),
        ];
        for request in requests {
            let uri = request.uri().to_string();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        }
    }

    #[tokio::test]
    async fn orbits_of_empty_collection() {
        let app = make_test_app();
        let request = Request::builder()
            .uri("/v1/orbits?count=3")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!([[], [], []])
        );

        let request = Request::builder()
            .uri("/v1/orbits/7")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_orbit_count_is_rejected() {
        let app = make_test_app();
        for uri in [
            "/v1/orbits?count=65",
            "/v1/orbits?count=18446744073709551615",
            "/v1/orbits/0?count=1000000000",
        ] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }

        let request = Request::builder()
            .uri(format!("/v1/orbits?count={}", MAX_ORBIT_COUNT))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let orbits = body_json(response).await;
        assert_eq!(orbits.as_array().unwrap().len(), MAX_ORBIT_COUNT);
    }

    #[tokio::test]
    async fn unknown_channel_and_batch_are_rejected() {
        let app = make_test_app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/chat/euphoria",
                serde_json::json!({ "message": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .uri("/v1/batches/nope/progress")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_round_trip_on_emotion_channel() {
        let app = make_test_app();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/chat/Calm",
                serde_json::json!({ "message": "breathe" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["assistant_message"]["content"], "echo: breathe");
        assert_eq!(body["user_message"]["channel"], "calm");

        let request = Request::builder()
            .uri("/v1/chat/calm")
            .body(Body::empty())
            .unwrap();
        let history = body_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(history.as_array().unwrap().len(), 2);

        let request = Request::builder()
            .uri("/v1/chat")
            .body(Body::empty())
            .unwrap();
        let nucleus_history = body_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(nucleus_history, serde_json::json!([]));
    }
}
