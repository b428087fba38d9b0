//! CollectionStore trait definition.

use super::models::{
    ChatMessage, ChatRole, Emotion, InsertOutcome, NewTrack, NucleusMetadata, Track,
};
use anyhow::Result;

/// Persistent store for the track collection, chat history and nucleus metadata.
pub trait CollectionStore: Send + Sync {
    // =========================================================================
    // Tracks
    // =========================================================================

    fn get_track(&self, id: i64) -> Result<Option<Track>>;

    fn get_track_by_spotify_id(&self, spotify_id: &str) -> Result<Option<Track>>;

    /// All tracks, most recently added first.
    fn list_tracks(&self) -> Result<Vec<Track>>;

    /// Tracks labeled with `emotion`, most recently added first.
    fn list_tracks_with_emotion(&self, emotion: Emotion) -> Result<Vec<Track>>;

    fn count_tracks(&self) -> Result<usize>;

    /// Inserts a new track, assigning `id` and `added_at`.
    ///
    /// A track whose spotify id is already stored is never overwritten; the
    /// existing row is returned as [`InsertOutcome::Duplicate`] instead. This
    /// holds even when two inserts race past an earlier existence check.
    fn insert_track(&self, track: &NewTrack) -> Result<InsertOutcome>;

    /// Returns false if no track had the given id.
    fn delete_track(&self, id: i64) -> Result<bool>;

    // =========================================================================
    // Chat
    // =========================================================================

    /// Appends a turn to a channel. `None` is the nucleus channel.
    fn append_chat_message(
        &self,
        role: ChatRole,
        content: &str,
        channel: Option<Emotion>,
    ) -> Result<ChatMessage>;

    /// The last `limit` messages of a channel, oldest first.
    fn recent_chat_messages(
        &self,
        channel: Option<Emotion>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>>;

    /// Full history of a channel, oldest first.
    fn list_chat_messages(&self, channel: Option<Emotion>) -> Result<Vec<ChatMessage>>;

    /// Deletes a channel's history and returns how many messages were removed.
    fn clear_chat_messages(&self, channel: Option<Emotion>) -> Result<usize>;

    // =========================================================================
    // Nucleus
    // =========================================================================

    fn get_nucleus_metadata(&self) -> Result<NucleusMetadata>;

    /// Overwrites the singleton row; `updated_at` is set by the store.
    fn update_nucleus_metadata(
        &self,
        name: &str,
        description: Option<&str>,
        dominant_emotion: Option<Emotion>,
    ) -> Result<NucleusMetadata>;
}
