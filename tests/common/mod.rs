//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{track_url, TestClient, TestServer};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_enrich() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.enrich_track(&track_url("joy0001")).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

#[allow(dead_code)]
mod client;
#[allow(dead_code)]
mod constants;
#[allow(dead_code)]
mod fakes;
mod server;

pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
