use super::pipeline::{Candidate, EnrichmentOutcome, TrackEnrichmentPipeline};
use super::url::parse_playlist_id;
use crate::collection_store::Track;
use crate::providers::{ProviderError, SpotifyApi};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No Spotify playlist id in URL")]
    InvalidUrl,

    #[error("Failed to list candidates: {0}")]
    Listing(#[from] ProviderError),
}

/// Running counters of one batch, readable while the batch is in flight.
#[derive(Debug, Default)]
pub struct BatchProgress {
    successes: AtomicUsize,
    processed: AtomicUsize,
    target: AtomicUsize,
    finished: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub successes: usize,
    pub processed: usize,
    pub target: usize,
    pub finished: bool,
}

impl BatchProgress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            successes: self.successes.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            target: self.target.load(Ordering::SeqCst),
            finished: self.finished.load(Ordering::SeqCst),
        }
    }
}

/// Progress of the batches started by this process, keyed by batch id.
///
/// Finished batches stay readable until the next batch is registered.
#[derive(Default)]
pub struct BatchRegistry {
    batches: Mutex<HashMap<String, Arc<BatchProgress>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, batch_id: &str) -> Arc<BatchProgress> {
        let mut batches = self.batches.lock().unwrap();
        batches.retain(|_, progress| !progress.finished.load(Ordering::SeqCst));
        let progress = Arc::new(BatchProgress::default());
        batches.insert(batch_id.to_string(), progress.clone());
        progress
    }

    pub fn get(&self, batch_id: &str) -> Option<ProgressSnapshot> {
        self.batches
            .lock()
            .unwrap()
            .get(batch_id)
            .map(|progress| progress.snapshot())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateIssue {
    pub candidate: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub target: usize,
    pub success: Vec<Track>,
    pub failed: Vec<CandidateIssue>,
    pub skipped: Vec<CandidateIssue>,
    pub total_processed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Candidates requested per wanted success.
    pub candidate_multiplier: usize,
    pub max_candidates: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            candidate_multiplier: 3,
            max_candidates: 100,
        }
    }
}

impl BatchSettings {
    pub fn candidate_limit(&self, target: usize) -> usize {
        target
            .saturating_mul(self.candidate_multiplier.max(1))
            .min(self.max_candidates)
            .max(1)
    }
}

/// Feeds candidates through the pipeline one at a time until `target`
/// successes are reached or candidates run out.
pub struct BatchEnrichmentController {
    pipeline: Arc<TrackEnrichmentPipeline>,
    spotify: Arc<dyn SpotifyApi>,
    settings: BatchSettings,
}

impl BatchEnrichmentController {
    pub fn new(
        pipeline: Arc<TrackEnrichmentPipeline>,
        spotify: Arc<dyn SpotifyApi>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            pipeline,
            spotify,
            settings,
        }
    }

    pub async fn enrich_playlist(
        &self,
        playlist_url: &str,
        target: usize,
        batch_id: &str,
        progress: &BatchProgress,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let playlist_id = parse_playlist_id(playlist_url).ok_or(BatchError::InvalidUrl)?;
        let listing = self
            .spotify
            .get_playlist_tracks(&playlist_id, self.settings.candidate_limit(target))
            .await?;
        info!(
            playlist_id = %playlist_id,
            "Playlist batch {}: {} candidates for a target of {}",
            batch_id,
            listing.len(),
            target
        );

        let candidates: Vec<_> = listing.into_iter().map(Candidate::from_listing).collect();
        Ok(self.run(batch_id, candidates, target, progress, cancel).await)
    }

    /// First-run seeding from the listener's own top tracks.
    pub async fn seed_from_top_tracks(
        &self,
        user_token: &str,
        target: usize,
        batch_id: &str,
        progress: &BatchProgress,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let listing = self
            .spotify
            .get_top_tracks(user_token, self.settings.candidate_limit(target))
            .await?;
        info!(
            "Seed batch {}: {} candidates for a target of {}",
            batch_id,
            listing.len(),
            target
        );

        let candidates: Vec<_> = listing.into_iter().map(Candidate::from_listing).collect();
        Ok(self.run(batch_id, candidates, target, progress, cancel).await)
    }

    /// Processes `candidates` in order. Candidates after the target is met,
    /// or after `cancel` fires, are never attempted.
    pub async fn run(
        &self,
        batch_id: &str,
        candidates: Vec<Candidate>,
        target: usize,
        progress: &BatchProgress,
        cancel: &CancellationToken,
    ) -> BatchReport {
        progress.target.store(target, Ordering::SeqCst);

        let mut report = BatchReport {
            batch_id: batch_id.to_string(),
            target,
            success: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            total_processed: 0,
            cancelled: false,
        };

        for candidate in candidates {
            if report.success.len() >= target {
                break;
            }
            if cancel.is_cancelled() {
                warn!("Batch {} cancelled after {} candidates", batch_id, report.total_processed);
                report.cancelled = true;
                break;
            }

            match self.pipeline.enrich(&candidate).await {
                EnrichmentOutcome::Success(track) => {
                    report.success.push(track);
                    progress.successes.fetch_add(1, Ordering::SeqCst);
                }
                EnrichmentOutcome::Skipped { reason, .. } => report.skipped.push(CandidateIssue {
                    candidate: candidate.url,
                    reason,
                }),
                EnrichmentOutcome::Failed(reason) => report.failed.push(CandidateIssue {
                    candidate: candidate.url,
                    reason: reason.to_string(),
                }),
            }
            report.total_processed += 1;
            progress.processed.fetch_add(1, Ordering::SeqCst);
        }

        progress.finished.store(true, Ordering::SeqCst);
        info!(
            "Batch {} done: {} succeeded, {} failed, {} skipped (target {})",
            batch_id,
            report.success.len(),
            report.failed.len(),
            report.skipped.len(),
            target
        );
        report
    }
}
