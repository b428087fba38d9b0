//! Conversations grounded in the collection's aggregate picture.

mod context;
mod service;

pub use context::{build_collection_context, format_sample_track, CollectionStats};
pub use service::{ChatError, ChatReply, ChatService, ChatSettings};
