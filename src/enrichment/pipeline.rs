//! Per-candidate enrichment: URL → metadata → lyrics → analysis → persisted track.

use super::nucleus::NucleusCurator;
use super::url::parse_track_id;
use crate::analysis::{AnalysisError, AnalysisProfile, AnalysisSource, ContentAnalyzer};
use crate::collection_store::{CollectionStore, InsertOutcome, NewTrack, Track};
use crate::providers::{LyricsProvider, SpotifyApi, SpotifyTrack};
use crate::server::metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const ALREADY_IN_COLLECTION: &str = "already in collection";

const PREVIEW_MIME_TYPE: &str = "audio/mpeg";

/// What to analyze when no lyrics provider is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum AnalysisFallback {
    /// No lyrics provider means no enrichment.
    #[default]
    None,
    /// Send the 30 second preview clip as audio.
    AudioPreview,
    /// Send only a link to the track.
    EmbedReference,
}

/// Why a candidate was abandoned.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FailureReason {
    #[error("No Spotify track id in URL")]
    InvalidUrl,

    #[error("Track metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("No lyrics found")]
    NoLyricsFound,

    #[error("Analysis response malformed: {0}")]
    AnalysisMalformed(String),

    #[error("Analysis provider exhausted: {0}")]
    AnalysisProviderExhausted(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::InvalidUrl => "invalid_url",
            FailureReason::MetadataUnavailable(_) => "metadata_unavailable",
            FailureReason::NoLyricsFound => "no_lyrics_found",
            FailureReason::AnalysisMalformed(_) => "analysis_malformed",
            FailureReason::AnalysisProviderExhausted(_) => "analysis_provider_exhausted",
            FailureReason::PersistenceError(_) => "persistence_error",
        }
    }
}

impl From<AnalysisError> for FailureReason {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Malformed(reason) => FailureReason::AnalysisMalformed(reason),
            AnalysisError::Exhausted(rotation) => {
                FailureReason::AnalysisProviderExhausted(rotation.to_string())
            }
        }
    }
}

/// One source URL to enrich, optionally with metadata already fetched by a
/// listing call (playlist expansion, top tracks).
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub url: String,
    pub metadata: Option<SpotifyTrack>,
}

impl Candidate {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            metadata: None,
        }
    }

    pub fn from_listing(track: SpotifyTrack) -> Self {
        Self {
            url: track.spotify_url.clone(),
            metadata: Some(track),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Success(Track),
    /// Nothing to do; carries the row that already exists.
    Skipped { reason: String, track: Track },
    Failed(FailureReason),
}

impl EnrichmentOutcome {
    fn skipped(track: Track) -> Self {
        EnrichmentOutcome::Skipped {
            reason: ALREADY_IN_COLLECTION.to_string(),
            track,
        }
    }
}

pub struct TrackEnrichmentPipeline {
    store: Arc<dyn CollectionStore>,
    spotify: Arc<dyn SpotifyApi>,
    lyrics: Option<Arc<dyn LyricsProvider>>,
    analyzer: Arc<ContentAnalyzer>,
    fallback: AnalysisFallback,
    curator: NucleusCurator,
}

impl TrackEnrichmentPipeline {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        spotify: Arc<dyn SpotifyApi>,
        lyrics: Option<Arc<dyn LyricsProvider>>,
        analyzer: Arc<ContentAnalyzer>,
        fallback: AnalysisFallback,
        nucleus_refresh_every: usize,
    ) -> Self {
        Self {
            curator: NucleusCurator::new(store.clone(), nucleus_refresh_every),
            store,
            spotify,
            lyrics,
            analyzer,
            fallback,
        }
    }

    /// Runs every stage for one candidate. Never fails: each problem is
    /// classified into the returned outcome.
    pub async fn enrich(&self, candidate: &Candidate) -> EnrichmentOutcome {
        let outcome = match self.run_stages(candidate).await {
            Ok(outcome) => outcome,
            Err(reason) => EnrichmentOutcome::Failed(reason),
        };

        match &outcome {
            EnrichmentOutcome::Success(track) => {
                info!(spotify_id = %track.spotify_id, "Enriched '{}' as {}", track.title, track.emotion);
                metrics::record_enrichment_outcome("success", "");
                if let Ok(count) = self.store.count_tracks() {
                    metrics::set_collection_size(count);
                }
                match self.curator.on_track_added() {
                    Ok(_) => {}
                    Err(err) => warn!("Failed to refresh nucleus metadata: {:#}", err),
                }
            }
            EnrichmentOutcome::Skipped { reason, track } => {
                debug!(spotify_id = %track.spotify_id, "Skipped candidate: {}", reason);
                metrics::record_enrichment_outcome("skipped", "duplicate");
            }
            EnrichmentOutcome::Failed(reason) => {
                warn!(url = %candidate.url, "Candidate failed: {}", reason);
                metrics::record_enrichment_outcome("failed", reason.code());
            }
        }
        outcome
    }

    async fn run_stages(&self, candidate: &Candidate) -> Result<EnrichmentOutcome, FailureReason> {
        // ParseURL
        let track_id = parse_track_id(&candidate.url).ok_or(FailureReason::InvalidUrl)?;

        // CheckDuplicate
        let existing = self
            .store
            .get_track_by_spotify_id(&track_id)
            .map_err(|e| FailureReason::PersistenceError(format!("{:#}", e)))?;
        if let Some(track) = existing {
            return Ok(EnrichmentOutcome::skipped(track));
        }

        // FetchMetadata
        let metadata = match &candidate.metadata {
            Some(metadata) if metadata.id == track_id => metadata.clone(),
            _ => self
                .spotify
                .get_track(&track_id)
                .await
                .map_err(|e| FailureReason::MetadataUnavailable(e.to_string()))?,
        };
        if metadata.id.is_empty() || metadata.name.trim().is_empty() {
            return Err(FailureReason::MetadataUnavailable(format!(
                "track {} has no title",
                track_id
            )));
        }

        // FetchLyrics
        let (source, lyrics_url) = self.content_source(&metadata, &candidate.url).await?;

        // AnalyzeContent
        let profile = self.analyzer.analyze(&source).await?;

        // Persist
        let new_track = assemble_track(&metadata, &candidate.url, &source, lyrics_url, profile);
        match self.store.insert_track(&new_track) {
            Ok(InsertOutcome::Inserted(track)) => Ok(EnrichmentOutcome::Success(track)),
            Ok(InsertOutcome::Duplicate(track)) => Ok(EnrichmentOutcome::skipped(track)),
            Err(err) => {
                error!(spotify_id = %track_id, "Failed to persist track: {:#}", err);
                Err(FailureReason::PersistenceError(format!("{:#}", err)))
            }
        }
    }

    /// The analysis substrate and, for lyrics, the attribution URL.
    async fn content_source(
        &self,
        metadata: &SpotifyTrack,
        source_url: &str,
    ) -> Result<(AnalysisSource, Option<String>), FailureReason> {
        let title = metadata.name.clone();
        let artist = metadata.artist_line();

        if let Some(lyrics_provider) = &self.lyrics {
            let lookup = lyrics_provider
                .search(&title, metadata.artists.first().map(String::as_str))
                .await
                .map_err(|e| {
                    warn!(spotify_id = %metadata.id, "Lyrics lookup failed: {}", e);
                    FailureReason::NoLyricsFound
                })?;
            let lyrics = lookup
                .lyrics
                .filter(|l| !l.trim().is_empty())
                .ok_or(FailureReason::NoLyricsFound)?;
            return Ok((
                AnalysisSource::LyricsText {
                    title,
                    artist,
                    lyrics,
                },
                lookup.url,
            ));
        }

        match self.fallback {
            AnalysisFallback::None => Err(FailureReason::NoLyricsFound),
            AnalysisFallback::AudioPreview => {
                let preview_url = metadata
                    .preview_url
                    .as_deref()
                    .ok_or(FailureReason::NoLyricsFound)?;
                let data = self.spotify.fetch_preview(preview_url).await.map_err(|e| {
                    warn!(spotify_id = %metadata.id, "Preview download failed: {}", e);
                    FailureReason::NoLyricsFound
                })?;
                Ok((
                    AnalysisSource::AudioBytes {
                        title,
                        artist,
                        mime_type: PREVIEW_MIME_TYPE.to_string(),
                        data,
                    },
                    None,
                ))
            }
            AnalysisFallback::EmbedReference => Ok((
                AnalysisSource::EmbedReference {
                    title,
                    artist,
                    url: source_url.to_string(),
                },
                None,
            )),
        }
    }
}

fn assemble_track(
    metadata: &SpotifyTrack,
    source_url: &str,
    source: &AnalysisSource,
    lyrics_url: Option<String>,
    profile: AnalysisProfile,
) -> NewTrack {
    let lyrics = match source {
        AnalysisSource::LyricsText { lyrics, .. } => Some(lyrics.clone()),
        _ => None,
    };

    NewTrack {
        spotify_id: metadata.id.clone(),
        source_url: source_url.trim().to_string(),
        title: metadata.name.clone(),
        artist: metadata.artist_line(),
        lyrics,
        lyrics_url,
        emotion: profile.emotion,
        valence: Some(profile.valence),
        energy: Some(profile.energy),
        tempo: profile.tempo,
        genre: Some(profile.genre),
        mood_description: Some(profile.mood_description),
        dominant_instruments: profile.dominant_instruments,
        vocal_characteristics: Some(profile.vocal_characteristics),
        duration_ms: metadata.duration_ms,
        thumbnail_url: metadata.image_url.clone(),
        preview_url: metadata.preview_url.clone(),
    }
}
