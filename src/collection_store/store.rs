//! SQLite-backed collection store implementation.

use super::models::{
    ChatMessage, ChatRole, Emotion, InsertOutcome, NewTrack, NucleusMetadata, Track,
};
use super::schema::{COLLECTION_VERSIONED_SCHEMAS, NUCLEUS_ROW_ID};
use super::trait_def::CollectionStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const TRACK_COLUMNS: &str = "id, spotify_id, source_url, title, artist, lyrics, lyrics_url,
    emotion, valence, energy, tempo, genre, mood_description, dominant_instruments,
    vocal_characteristics, duration_ms, thumbnail_url, preview_url, has_preview, added_at";

const CHAT_COLUMNS: &str = "id, role, content, channel, timestamp";

/// SQLite-backed collection store.
#[derive(Clone)]
pub struct SqliteCollectionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCollectionStore {
    /// Opens (creating if needed) the collection database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open collection database")?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on collection database")?;

        Self::from_connection(conn)
    }

    /// A store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migrate_if_needed(&mut conn, COLLECTION_VERSIONED_SCHEMAS, "collection")?;

        let track_count: usize =
            conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        let message_count: usize =
            conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |r| r.get(0))?;
        info!(
            "Collection store ready: {} tracks, {} chat messages",
            track_count, message_count
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn query_tracks(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Track>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let tracks = stmt
            .query_map(params, track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn query_track(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Option<Track>> {
        let mut stmt = conn.prepare_cached(sql)?;
        Ok(stmt.query_row(params, track_from_row).optional()?)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        anyhow!(message).into(),
    )
}

fn emotion_column(row: &Row, idx: usize) -> rusqlite::Result<Emotion> {
    let raw: String = row.get(idx)?;
    Emotion::from_str(&raw).ok_or_else(|| conversion_error(idx, format!("unknown emotion '{}'", raw)))
}

fn optional_emotion_column(row: &Row, idx: usize) -> rusqlite::Result<Option<Emotion>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => Emotion::from_str(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("unknown emotion '{}'", raw))),
    }
}

fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        spotify_id: row.get(1)?,
        source_url: row.get(2)?,
        title: row.get(3)?,
        artist: row.get(4)?,
        lyrics: row.get(5)?,
        lyrics_url: row.get(6)?,
        emotion: emotion_column(row, 7)?,
        valence: row.get(8)?,
        energy: row.get(9)?,
        tempo: row.get(10)?,
        genre: row.get(11)?,
        mood_description: row.get(12)?,
        dominant_instruments: row.get(13)?,
        vocal_characteristics: row.get(14)?,
        duration_ms: row.get(15)?,
        thumbnail_url: row.get(16)?,
        preview_url: row.get(17)?,
        has_preview: row.get::<_, i32>(18)? != 0,
        added_at: row.get(19)?,
    })
}

fn chat_message_from_row(row: &Row) -> rusqlite::Result<ChatMessage> {
    let raw_role: String = row.get(1)?;
    let role = ChatRole::from_str(&raw_role)
        .ok_or_else(|| conversion_error(1, format!("unknown chat role '{}'", raw_role)))?;
    Ok(ChatMessage {
        id: row.get(0)?,
        role,
        content: row.get(2)?,
        channel: optional_emotion_column(row, 3)?,
        timestamp: row.get(4)?,
    })
}

fn channel_label(channel: Option<Emotion>) -> Option<&'static str> {
    channel.map(|e| e.as_str())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl CollectionStore for SqliteCollectionStore {
    fn get_track(&self, id: i64) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        Self::query_track(
            &conn,
            &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
            params![id],
        )
    }

    fn get_track_by_spotify_id(&self, spotify_id: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        Self::query_track(
            &conn,
            &format!("SELECT {} FROM tracks WHERE spotify_id = ?1", TRACK_COLUMNS),
            params![spotify_id],
        )
    }

    fn list_tracks(&self) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        Self::query_tracks(
            &conn,
            &format!(
                "SELECT {} FROM tracks ORDER BY added_at DESC, id DESC",
                TRACK_COLUMNS
            ),
            [],
        )
    }

    fn list_tracks_with_emotion(&self, emotion: Emotion) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        Self::query_tracks(
            &conn,
            &format!(
                "SELECT {} FROM tracks WHERE emotion = ?1 ORDER BY added_at DESC, id DESC",
                TRACK_COLUMNS
            ),
            params![emotion.as_str()],
        )
    }

    fn count_tracks(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?)
    }

    fn insert_track(&self, track: &NewTrack) -> Result<InsertOutcome> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO tracks
             (spotify_id, source_url, title, artist, lyrics, lyrics_url, emotion, valence,
              energy, tempo, genre, mood_description, dominant_instruments,
              vocal_characteristics, duration_ms, thumbnail_url, preview_url, has_preview,
              added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19)",
            params![
                track.spotify_id,
                track.source_url,
                track.title,
                track.artist,
                track.lyrics,
                track.lyrics_url,
                track.emotion.as_str(),
                track.valence,
                track.energy,
                track.tempo,
                track.genre,
                track.mood_description,
                track.dominant_instruments,
                track.vocal_characteristics,
                track.duration_ms,
                track.thumbnail_url,
                track.preview_url,
                track.preview_url.is_some() as i32,
                now_millis(),
            ],
        );

        match inserted {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                let stored = Self::query_track(
                    &conn,
                    &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
                    params![id],
                )?
                .ok_or_else(|| anyhow!("Track {} vanished right after insert", id))?;
                Ok(InsertOutcome::Inserted(stored))
            }
            Err(err) if is_unique_violation(&err) => {
                debug!("Track {} already in collection", track.spotify_id);
                let existing = Self::query_track(
                    &conn,
                    &format!("SELECT {} FROM tracks WHERE spotify_id = ?1", TRACK_COLUMNS),
                    params![track.spotify_id],
                )?
                .ok_or_else(|| anyhow!("Constraint violation inserting {}", track.spotify_id))?;
                Ok(InsertOutcome::Duplicate(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn delete_track(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn append_chat_message(
        &self,
        role: ChatRole,
        content: &str,
        channel: Option<Emotion>,
    ) -> Result<ChatMessage> {
        let conn = self.conn.lock().unwrap();
        let timestamp = now_millis();
        conn.execute(
            "INSERT INTO chat_messages (role, content, channel, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![role.as_str(), content, channel_label(channel), timestamp],
        )?;
        Ok(ChatMessage {
            id: conn.last_insert_rowid(),
            role,
            content: content.to_string(),
            channel,
            timestamp,
        })
    }

    fn recent_chat_messages(
        &self,
        channel: Option<Emotion>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM chat_messages WHERE channel IS ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
            CHAT_COLUMNS
        ))?;
        let mut messages = stmt
            .query_map(
                params![channel_label(channel), limit as i64],
                chat_message_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    fn list_chat_messages(&self, channel: Option<Emotion>) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM chat_messages WHERE channel IS ?1 ORDER BY timestamp, id",
            CHAT_COLUMNS
        ))?;
        let messages = stmt
            .query_map(params![channel_label(channel)], chat_message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    fn clear_chat_messages(&self, channel: Option<Emotion>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM chat_messages WHERE channel IS ?1",
            params![channel_label(channel)],
        )?;
        Ok(deleted)
    }

    fn get_nucleus_metadata(&self) -> Result<NucleusMetadata> {
        let conn = self.conn.lock().unwrap();
        let metadata = conn.query_row(
            "SELECT name, description, dominant_emotion, updated_at
             FROM nucleus_metadata WHERE id = ?1",
            params![NUCLEUS_ROW_ID],
            |row| {
                Ok(NucleusMetadata {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    dominant_emotion: optional_emotion_column(row, 2)?,
                    updated_at: row.get(3)?,
                })
            },
        )?;
        Ok(metadata)
    }

    fn update_nucleus_metadata(
        &self,
        name: &str,
        description: Option<&str>,
        dominant_emotion: Option<Emotion>,
    ) -> Result<NucleusMetadata> {
        let conn = self.conn.lock().unwrap();
        let updated_at = now_millis();
        let updated = conn.execute(
            "UPDATE nucleus_metadata
             SET name = ?2, description = ?3, dominant_emotion = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                NUCLEUS_ROW_ID,
                name,
                description,
                channel_label(dominant_emotion),
                updated_at
            ],
        )?;
        if updated == 0 {
            bail!("Nucleus metadata row is missing");
        }
        Ok(NucleusMetadata {
            name: name.to_string(),
            description: description.map(str::to_string),
            dominant_emotion,
            updated_at,
        })
    }
}
