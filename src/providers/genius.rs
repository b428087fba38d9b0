//! Genius lyrics lookup: API search followed by scraping the song page.

use super::ProviderError;
use crate::credentials::ApiKey;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_GENIUS_API_BASE: &str = "https://api.genius.com";

const SERVICE: &str = "genius";
const PAGE_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const LYRICS_CONTAINER_MARKER: &str = "data-lyrics-container=\"true\"";
const EXCLUDED_MARKER: &str = "data-exclude-from-selection=\"true\"";

lazy_static! {
    static ref DIV_TAG: Regex = Regex::new(r"(?i)<(/?)div\b[^>]*>").unwrap();
    static ref LINE_BREAK: Regex = Regex::new(r"(?i)<br\s*/?>").unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Result of a lyrics search. `lyrics == None` is a valid "not found".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricsLookup {
    pub lyrics: Option<String>,
    /// Attribution link to the song page, when a page was matched.
    pub url: Option<String>,
}

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    async fn search(&self, title: &str, artist: Option<&str>) -> Result<LyricsLookup, ProviderError>;
}

pub struct GeniusClient {
    client: Client,
    api_base: String,
    access_token: ApiKey,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "type")]
    kind: String,
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    url: String,
}

impl GeniusClient {
    pub fn new(api_base: impl Into<String>, access_token: ApiKey) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    async fn find_song_url(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let url = format!(
            "{}/search?q={}",
            self.api_base,
            urlencoding::encode(query)
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.access_token.expose())
            .send()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }

        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(SERVICE, e))?;
        Ok(envelope
            .response
            .hits
            .into_iter()
            .find(|hit| hit.kind == "song")
            .map(|hit| hit.result.url))
    }
}

#[async_trait]
impl LyricsProvider for GeniusClient {
    async fn search(&self, title: &str, artist: Option<&str>) -> Result<LyricsLookup, ProviderError> {
        let query = match artist {
            Some(artist) => format!("{} {}", title, artist),
            None => title.to_string(),
        };

        let Some(song_url) = self.find_song_url(&query).await? else {
            debug!("No Genius match for '{}'", query);
            return Ok(LyricsLookup::default());
        };

        let response = self
            .client
            .get(&song_url)
            .header(reqwest::header::USER_AGENT, PAGE_USER_AGENT)
            .send()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;

        if !response.status().is_success() {
            debug!("Genius page {} returned {}", song_url, response.status());
            return Ok(LyricsLookup {
                lyrics: None,
                url: Some(song_url),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| ProviderError::connection(SERVICE, e))?;
        Ok(LyricsLookup {
            lyrics: extract_lyrics(&html),
            url: Some(song_url),
        })
    }
}

/// Splits `s`, which starts right after an opening `<div ...>`, at the matching
/// closing tag. Returns the inner content and the byte length consumed
/// including the closing tag. Unbalanced input consumes everything.
fn split_div_body(s: &str) -> (&str, usize) {
    let mut depth = 1usize;
    for caps in DIV_TAG.captures_iter(s) {
        let Some(tag) = caps.get(0) else { continue };
        if &caps[1] == "/" {
            depth -= 1;
            if depth == 0 {
                return (&s[..tag.start()], tag.end());
            }
        } else {
            depth += 1;
        }
    }
    (s, s.len())
}

/// Drops every `<div>` block carrying `marker`, including its nested markup.
fn remove_marked_divs(fragment: &str, marker: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut rest = fragment;
    while let Some(marker_pos) = rest.find(marker) {
        let Some(div_start) = rest[..marker_pos].rfind("<div") else {
            break;
        };
        let Some(open_end) = rest[marker_pos..].find('>') else {
            break;
        };
        let body_start = marker_pos + open_end + 1;
        let (_, consumed) = split_div_body(&rest[body_start..]);
        out.push_str(&rest[..div_start]);
        rest = &rest[body_start + consumed..];
    }
    out.push_str(rest);
    out
}

fn fragment_to_text(fragment: &str) -> String {
    let cleaned = remove_marked_divs(fragment, EXCLUDED_MARKER);
    let with_breaks = LINE_BREAK.replace_all(&cleaned, "\n");
    let text = ANY_TAG.replace_all(&with_breaks, "");
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

/// Extracts the lyrics text from a Genius song page.
///
/// Lyrics live in one or more `data-lyrics-container` divs; their contents are
/// concatenated, line breaks preserved and markup removed. `None` when the page
/// holds no non-blank lyrics.
pub fn extract_lyrics(html: &str) -> Option<String> {
    let mut sections = Vec::new();
    let mut rest = html;

    while let Some(marker_pos) = rest.find(LYRICS_CONTAINER_MARKER) {
        let Some(open_end) = rest[marker_pos..].find('>') else {
            break;
        };
        let body_start = marker_pos + open_end + 1;
        let (inner, consumed) = split_div_body(&rest[body_start..]);
        sections.push(fragment_to_text(inner));
        rest = &rest[body_start + consumed..];
    }

    let lyrics = sections
        .join("\n")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    if lyrics.is_empty() {
        None
    } else {
        Some(lyrics)
    }
}
