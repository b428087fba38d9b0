//! AI profiling of tracks: prompts, response extraction and validation.

mod analyzer;
mod profile;
mod prompt;

pub use analyzer::{AnalysisError, ContentAnalyzer};
pub use profile::{extract_json_object, parse_analysis_response, validate_profile, AnalysisProfile};
pub use prompt::{build_analysis_messages, AnalysisSource};
