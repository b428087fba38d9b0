//! Turning source URLs into analyzed, persisted tracks.

mod batch;
mod nucleus;
mod pipeline;
mod url;

pub use batch::{
    BatchEnrichmentController, BatchError, BatchProgress, BatchRegistry, BatchReport,
    BatchSettings, CandidateIssue, ProgressSnapshot,
};
pub use nucleus::{nucleus_name, NucleusCurator};
pub use pipeline::{
    AnalysisFallback, Candidate, EnrichmentOutcome, FailureReason, TrackEnrichmentPipeline,
    ALREADY_IN_COLLECTION,
};
pub use url::{parse_playlist_id, parse_track_id, track_url};
