//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When API routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("POST request failed")
    }

    async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE request failed")
    }

    // ========================================================================
    // Tracks
    // ========================================================================

    pub async fn enrich_track(&self, url: &str) -> Response {
        self.post("/v1/tracks", json!({ "url": url })).await
    }

    pub async fn list_tracks(&self) -> Response {
        self.get("/v1/tracks").await
    }

    pub async fn count_tracks(&self) -> Response {
        self.get("/v1/tracks/count").await
    }

    pub async fn get_track(&self, id: i64) -> Response {
        self.get(&format!("/v1/tracks/{}", id)).await
    }

    pub async fn delete_track(&self, id: i64) -> Response {
        self.delete(&format!("/v1/tracks/{}", id)).await
    }

    // ========================================================================
    // Batches
    // ========================================================================

    pub async fn enrich_playlist(
        &self,
        url: &str,
        target: usize,
        batch_id: Option<&str>,
    ) -> Response {
        self.post(
            "/v1/playlists",
            json!({ "url": url, "target": target, "batch_id": batch_id }),
        )
        .await
    }

    pub async fn seed_collection(&self, access_token: &str, target: usize) -> Response {
        self.post(
            "/v1/collection/seed",
            json!({ "access_token": access_token, "target": target }),
        )
        .await
    }

    pub async fn batch_progress(&self, batch_id: &str) -> Response {
        self.get(&format!("/v1/batches/{}/progress", batch_id)).await
    }

    // ========================================================================
    // Orbits and nucleus
    // ========================================================================

    pub async fn orbits(&self, count: usize) -> Response {
        self.get(&format!("/v1/orbits?count={}", count)).await
    }

    pub async fn orbit(&self, index: usize, count: usize) -> Response {
        self.get(&format!("/v1/orbits/{}?count={}", index, count))
            .await
    }

    pub async fn nucleus(&self) -> Response {
        self.get("/v1/nucleus").await
    }

    // ========================================================================
    // Chat
    // ========================================================================

    fn chat_path(channel: Option<&str>) -> String {
        match channel {
            Some(emotion) => format!("/v1/chat/{}", emotion),
            None => "/v1/chat".to_string(),
        }
    }

    pub async fn send_chat(&self, channel: Option<&str>, message: &str) -> Response {
        self.post(&Self::chat_path(channel), json!({ "message": message }))
            .await
    }

    pub async fn chat_history(&self, channel: Option<&str>) -> Response {
        self.get(&Self::chat_path(channel)).await
    }

    pub async fn clear_chat(&self, channel: Option<&str>) -> Response {
        self.delete(&Self::chat_path(channel)).await
    }
}
