//! Common test utilities shared across all integration test files.
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::sync::Arc;
use std::time::Duration;

use genai_transport::{Backend, Client, HttpOptions, Payload, StaticTokenSource};
use serde_json::json;

/// Access token handed out by the Vertex AI test clients.
#[allow(dead_code)]
pub const TEST_TOKEN: &str = "fake-access-token";

/// API key used by the Gemini API test clients.
#[allow(dead_code)]
pub const TEST_API_KEY: &str = "test-api-key";

/// Upper bound for any single test that talks to a local server.
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A Gemini API client pointed at `base_url`.
#[allow(dead_code)]
pub fn gemini_client(base_url: &str) -> Client {
    Client::builder(Backend::GeminiApi)
        .api_key(TEST_API_KEY)
        .http_options(HttpOptions::new().with_base_url(base_url))
        .build()
        .expect("Gemini client should build")
}

/// A Vertex AI client pointed at `base_url`, authenticated with [`TEST_TOKEN`].
#[allow(dead_code)]
pub fn vertex_client(base_url: &str) -> Client {
    Client::builder(Backend::VertexAi)
        .project("test-project")
        .location("us-central1")
        .token_source(Arc::new(StaticTokenSource::new(TEST_TOKEN)))
        .http_options(HttpOptions::new().with_base_url(base_url))
        .build()
        .expect("Vertex client should build")
}

/// A minimal `generateContent` request body.
#[allow(dead_code)]
pub fn text_request(text: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert(
        "contents".to_string(),
        json!([{"role": "user", "parts": [{"text": text}]}]),
    );
    payload
}

/// Wraps a future with a timeout, panicking if the timeout is exceeded.
///
/// # Panics
///
/// Panics with a descriptive message if the timeout is exceeded.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .unwrap_or_else(|_| panic!("Test timed out after {duration:?}"))
}
