use axum::extract::FromRef;

use crate::chat::ChatService;
use crate::collection_store::CollectionStore;
use crate::enrichment::{BatchEnrichmentController, BatchRegistry, TrackEnrichmentPipeline};
use crate::providers::VideoSearch;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCollectionStore = Arc<dyn CollectionStore>;
/// Absent when Spotify is not configured.
pub type OptionalPipeline = Option<Arc<TrackEnrichmentPipeline>>;
pub type OptionalBatchController = Option<Arc<BatchEnrichmentController>>;
pub type GuardedBatchRegistry = Arc<BatchRegistry>;
pub type GuardedChatService = Arc<ChatService>;
pub type OptionalVideoSearch = Option<Arc<dyn VideoSearch>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub store: GuardedCollectionStore,
    pub pipeline: OptionalPipeline,
    pub batch_controller: OptionalBatchController,
    pub batches: GuardedBatchRegistry,
    pub chat: GuardedChatService,
    pub video_search: OptionalVideoSearch,
}

impl FromRef<ServerState> for GuardedCollectionStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for OptionalPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for OptionalBatchController {
    fn from_ref(input: &ServerState) -> Self {
        input.batch_controller.clone()
    }
}

impl FromRef<ServerState> for GuardedBatchRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.batches.clone()
    }
}

impl FromRef<ServerState> for GuardedChatService {
    fn from_ref(input: &ServerState) -> Self {
        input.chat.clone()
    }
}

impl FromRef<ServerState> for OptionalVideoSearch {
    fn from_ref(input: &ServerState) -> Self {
        input.video_search.clone()
    }
}
