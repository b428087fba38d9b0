mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{
    ChatMessage, ChatRole, Emotion, InsertOutcome, NewTrack, NucleusMetadata, Track,
};
pub use schema::DEFAULT_NUCLEUS_NAME;
pub use store::SqliteCollectionStore;
pub use trait_def::CollectionStore;
