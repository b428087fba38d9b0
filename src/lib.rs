//! Nucleus server library
//!
//! A music collection that profiles each added track with an AI model and
//! lets listeners talk to the collection as a whole.

pub mod analysis;
pub mod chat;
pub mod collection_store;
pub mod config;
pub mod credentials;
pub mod enrichment;
pub mod llm;
pub mod orbit;
pub mod providers;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use collection_store::{CollectionStore, SqliteCollectionStore};
pub use server::{make_app, run_server, RequestsLoggingLevel};
