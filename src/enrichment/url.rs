use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TRACK_ID: Regex = Regex::new(
        r"(?:open\.spotify\.com/(?:intl-[A-Za-z-]+/)?(?:embed/)?track/|spotify:track:)([A-Za-z0-9]+)"
    )
    .unwrap();
    static ref PLAYLIST_ID: Regex = Regex::new(
        r"(?:open\.spotify\.com/(?:intl-[A-Za-z-]+/)?(?:embed/)?playlist/|spotify:playlist:)([A-Za-z0-9]+)"
    )
    .unwrap();
}

/// Spotify track id from a share link, embed link or `spotify:track:` URI.
pub fn parse_track_id(url: &str) -> Option<String> {
    TRACK_ID
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn parse_playlist_id(url: &str) -> Option<String> {
    PLAYLIST_ID
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn track_url(track_id: &str) -> String {
    format!("https://open.spotify.com/track/{}", track_id)
}
