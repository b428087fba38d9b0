//! SQLite schema definitions for the collection database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};
use anyhow::Result;
use rusqlite::{params, Connection};

/// Enriched tracks. `spotify_id` is the uniqueness guard against concurrent inserts.
const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("spotify_id", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("source_url", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text),
        // Lyrics
        sqlite_column!("lyrics", &SqlType::Text),
        sqlite_column!("lyrics_url", &SqlType::Text),
        // Analysis
        sqlite_column!("emotion", &SqlType::Text, non_null = true),
        sqlite_column!("valence", &SqlType::Real),
        sqlite_column!("energy", &SqlType::Real),
        sqlite_column!("tempo", &SqlType::Integer),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("mood_description", &SqlType::Text),
        sqlite_column!("dominant_instruments", &SqlType::Text),
        sqlite_column!("vocal_characteristics", &SqlType::Text),
        // Media
        sqlite_column!("duration_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("thumbnail_url", &SqlType::Text),
        sqlite_column!("preview_url", &SqlType::Text),
        sqlite_column!("has_preview", &SqlType::Integer, non_null = true),
        // Unix milliseconds
        sqlite_column!("added_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_tracks_added_at", "added_at"),
        ("idx_tracks_emotion", "emotion"),
    ],
};

/// Chat turns; `channel` is NULL for the nucleus conversation, an emotion label otherwise.
const CHAT_MESSAGES_TABLE: Table = Table {
    name: "chat_messages",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("role", &SqlType::Text, non_null = true),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!("channel", &SqlType::Text),
        sqlite_column!("timestamp", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_chat_messages_channel", "channel")],
};

const NUCLEUS_METADATA_TABLE: Table = Table {
    name: "nucleus_metadata",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("dominant_emotion", &SqlType::Text),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
};

pub const NUCLEUS_ROW_ID: i64 = 1;
pub const DEFAULT_NUCLEUS_NAME: &str = "Nucleus";

fn seed_nucleus_row(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO nucleus_metadata (id, name, description, dominant_emotion, updated_at)
         VALUES (?1, ?2, NULL, NULL, ?3)",
        params![
            NUCLEUS_ROW_ID,
            DEFAULT_NUCLEUS_NAME,
            chrono::Utc::now().timestamp_millis()
        ],
    )?;
    Ok(())
}

pub const COLLECTION_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[TRACKS_TABLE, CHAT_MESSAGES_TABLE, NUCLEUS_METADATA_TABLE],
    seed: Some(seed_nucleus_row),
    migration: None,
}];
