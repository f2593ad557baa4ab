//! Transport and protocol layer for the Gemini API and Vertex AI.
//!
//! This crate turns logical API calls into HTTP requests and WebSocket
//! sessions for either backend:
//!
//! - [`Client::send_request`] for unary calls, returning a [`Payload`].
//! - [`Client::send_stream_request`] for server-streaming calls, returning a
//!   pull-based [`ResponseStream`].
//! - [`Client::upload_file`] for resumable chunked uploads.
//! - [`Client::live`] for bidirectional realtime sessions.
//! - [`Client::names`] for backend-aware resource and model names.
//!
//! Requests and responses are plain JSON objects keyed by wire field names;
//! typed structs cross the boundary through [`to_payload`] / [`from_payload`].
//!
//! # Example
//!
//! ```no_run
//! use genai_transport::{Backend, CallContext, Client, Payload};
//! use reqwest::Method;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), genai_transport::GenaiError> {
//! let client = Client::builder(Backend::GeminiApi).api_key("your-api-key").build()?;
//! let model = client.names().model("gemini-2.0-flash")?;
//!
//! let mut body = Payload::new();
//! body.insert("contents".into(), json!([{"role": "user", "parts": [{"text": "Hello"}]}]));
//!
//! let response = client
//!     .send_request(
//!         &format!("{model}:generateContent"),
//!         Method::POST,
//!         &body,
//!         None,
//!         &CallContext::new(),
//!     )
//!     .await?;
//! println!("{}", response["candidates"][0]["content"]["parts"][0]["text"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Debugging
//!
//! Set `LOUD_WIRE=1` to print every request, response, stream event, upload
//! chunk and Live frame to stderr.

mod auth;
mod backend;
mod client;
mod config;
mod context;
mod errors;
mod files;
mod http;
mod live;
mod payload;
mod resource_names;
mod streaming;

pub use auth::{StaticTokenSource, TokenSource};
pub use backend::{BackendStrategy, GeminiApiBackend, LiveEndpoint, VertexAiBackend};
pub use client::{Client, ClientBuilder};
pub use config::{BaseUrls, Backend, GEMINI_BASE_URL_ENV, HttpOptions, VERTEX_BASE_URL_ENV};
pub use context::CallContext;
pub use errors::{ApiError, GenaiError};
pub use files::{File, FileError, FileSource, FileState, VideoMetadata};
pub use live::{
    Live, LiveClientMessage, LiveClientSetup, LiveConnectConfig, LiveServerMessage, Session,
};
pub use payload::{HTTP_HEADERS_FIELD, Payload, from_payload, to_payload};
pub use resource_names::{CACHED_CONTENTS_COLLECTION, ResourceNamer};
pub use streaming::ResponseStream;
