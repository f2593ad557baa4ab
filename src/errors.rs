use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payload::Payload;

/// Defines errors that can occur when talking to the Gemini API or Vertex AI.
///
/// # Example: Handling API Errors
///
/// ```ignore
/// match client.send_request("models/gemini-2.0-flash", Method::GET, Payload::new(), None, &ctx).await {
///     Err(GenaiError::Api(err)) if err.code == 429 => {
///         tracing::warn!("Rate limited, request_id: {:?}", err.request_id);
///         // Retry with backoff
///     }
///     Err(GenaiError::Api(err)) => {
///         tracing::error!("API error {}: {} ({})", err.code, err.message, err.status);
///     }
///     // ...
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenaiError {
    /// The caller supplied an identifier or payload the client cannot use.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The composed request URL could not be parsed.
    #[error("Invalid URL '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Sending the request failed before any response arrived.
    #[error("{operation} request to {url} failed: {source}")]
    Transport {
        operation: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Reading a response body failed.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Structured error reported by the server.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("SSE parsing error: {0}")]
    Parse(String),

    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned a successful response but with unexpected or invalid content.
    ///
    /// Unlike `InvalidInput` (caller's fault), this represents an issue with
    /// the API response itself.
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    /// A chunked upload ended in an inconsistent state.
    ///
    /// Covers short reads from the source and uploads the server never
    /// finalized. Bytes may have been transmitted, but no file was created.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Opening the Live WebSocket failed.
    #[error("Connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A Live frame arrived that is not a valid server message.
    ///
    /// The session stays open; the caller decides whether to keep receiving.
    #[error("invalid message format. message type: {message_type}, length: {length}: {source}")]
    MalformedMessage {
        message_type: &'static str,
        length: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The Live session was closed by the server or the socket ended.
    #[error("Live session closed")]
    SessionClosed,

    /// Obtaining credentials from the token source failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The call context was cancelled before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Request timed out after the duration set on the call context.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Failed to build the HTTP client.
    ///
    /// This typically only occurs in exceptional circumstances such as
    /// TLS backend initialization failures.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Internal client error: {0}")]
    Internal(String),
}

impl GenaiError {
    /// Returns `true` if this error is likely transient and the request may succeed on retry.
    ///
    /// The client never retries on its own; this helper only classifies.
    ///
    /// - **Transport errors**: connection resets, refused connections, TLS errors
    /// - **Rate limits (429)** and **server errors (5xx)**
    /// - **Timeouts**
    ///
    /// # Example
    ///
    /// ```rust
    /// use genai_transport::{ApiError, GenaiError};
    ///
    /// let rate_limited = GenaiError::Api(ApiError {
    ///     code: 429,
    ///     message: "Resource exhausted".to_string(),
    ///     status: "RESOURCE_EXHAUSTED".to_string(),
    ///     ..Default::default()
    /// });
    /// assert!(rate_limited.is_retryable());
    ///
    /// let bad_request = GenaiError::InvalidInput("model is empty".to_string());
    /// assert!(!bad_request.is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            GenaiError::Transport { .. }
            | GenaiError::Http(_)
            | GenaiError::Connect { .. }
            | GenaiError::WebSocket(_)
            | GenaiError::Timeout(_) => true,

            GenaiError::Api(err) => err.code == 429 || err.code >= 500,

            GenaiError::InvalidInput(_)
            | GenaiError::Url { .. }
            | GenaiError::Parse(_)
            | GenaiError::Json(_)
            | GenaiError::MalformedResponse(_)
            | GenaiError::Upload(_)
            | GenaiError::MalformedMessage { .. }
            | GenaiError::SessionClosed
            | GenaiError::Auth(_)
            | GenaiError::Cancelled
            | GenaiError::ClientBuild(_)
            | GenaiError::Internal(_) => false,
        }
    }

    /// Returns the server-reported error, if this is one.
    #[must_use]
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            GenaiError::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// An error response from the server.
///
/// Wire shape: `{"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT", "details": [...]}}`.
#[derive(Clone, Debug, Default, PartialEq, Error, Serialize, Deserialize)]
#[error("Error {code}, Message: {message}, Status: {status}, Details: {details:?}")]
pub struct ApiError {
    /// HTTP response status code.
    #[serde(default)]
    pub code: i32,
    /// Server response message.
    #[serde(default)]
    pub message: String,
    /// Server response status, e.g. `INVALID_ARGUMENT`.
    #[serde(default)]
    pub status: String,
    /// Extra context attached by the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Payload>,
    /// Request ID from the `x-goog-request-id` header, if available
    #[serde(skip)]
    pub request_id: Option<String>,
}
