//! Hosts, SDK headers and URL joining shared by every request.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::backend::BackendStrategy;
use crate::errors::GenaiError;

/// Default host of the Gemini API.
pub(crate) const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

/// Header name for API key authentication.
///
/// API keys travel in a header rather than a query parameter so they do not
/// show up in URLs, proxy logs or error messages. The Live endpoint is the
/// exception; WebSocket handshakes carry the key as `?key=`.
pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client identification header understood by Google APIs.
pub(crate) const API_CLIENT_HEADER: &str = "x-goog-api-client";

/// Default regional host of Vertex AI.
pub(crate) fn vertex_default_base_url(location: &str) -> String {
    format!("https://{location}-aiplatform.googleapis.com/")
}

/// Value of both `user-agent` and `x-goog-api-client`.
pub(crate) fn sdk_client_identifier() -> String {
    format!(
        "genai-transport/{} gl-rust/{}",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_RUST_VERSION")
    )
}

/// Inserts the SDK header set over whatever `headers` already holds.
pub(crate) fn apply_sdk_headers(
    headers: &mut HeaderMap,
    backend: &dyn BackendStrategy,
) -> Result<(), GenaiError> {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    backend.apply_auth_headers(headers)?;

    let ident = HeaderValue::from_str(&sdk_client_identifier())
        .map_err(|e| GenaiError::Internal(format!("invalid client identifier header: {e}")))?;
    headers.insert(USER_AGENT, ident.clone());
    headers.insert(API_CLIENT_HEADER, ident);
    Ok(())
}

/// Joins a base URL and a path with exactly one `/` between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
