//! Shared constants for end-to-end tests
//!
//! The fake Spotify catalog, the fake lyrics database and the fake model all
//! answer from the tables below. When test data changes, update only this file.

// ============================================================================
// Fake Spotify catalog
// ============================================================================

/// (track id, title, emotion the fake model assigns)
pub const CATALOG: &[(&str, &str, &str)] = &[
    ("joy0001", "Sunrise Parade", "joy"),
    ("joy0002", "Golden Hour Bicycle", "joy"),
    ("joy0003", "Confetti Lungs", "joy"),
    ("sad0001", "Empty Station", "sadness"),
    ("sad0002", "Letters Never Sent", "sadness"),
    ("calm001", "Low Tide", "calm"),
    ("love001", "Porch Light", "love"),
    ("nost001", "Cassette Summers", "nostalgia"),
    ("nolyr01", "Instrumental Drift", "calm"),
];

/// Known to the catalog, but Genius has no lyrics for it.
pub const NO_LYRICS_TRACK_ID: &str = "nolyr01";

/// Not in the catalog at all.
pub const UNKNOWN_TRACK_ID: &str = "missing01";

pub const PLAYLIST_ID: &str = "mixtape01";

/// Playlist order; the no-lyrics track comes first on purpose.
pub const PLAYLIST_TRACKS: &[&str] = &["nolyr01", "joy0001", "sad0001", "calm001", "joy0002"];

/// The only user token the fake accepts for top tracks.
pub const USER_TOKEN: &str = "listener-token";

/// Top tracks for [`USER_TOKEN`], most listened first.
pub const TOP_TRACKS: &[&str] = &["love001", "nost001", "joy0003"];

// ============================================================================
// Credentials
// ============================================================================

/// The first key of the pool always fails; rotation must reach the second.
pub const GEMINI_KEYS: &[&str] = &["revoked-key", "good-key"];

pub const GOOD_GEMINI_KEY: &str = "good-key";

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub fn track_url(id: &str) -> String {
    format!("https://open.spotify.com/track/{}?si=e2e", id)
}

pub fn playlist_url(id: &str) -> String {
    format!("https://open.spotify.com/playlist/{}", id)
}

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// The nucleus row is rebuilt every this many inserts.
pub const NUCLEUS_REFRESH_EVERY: usize = 5;
