//! Request composition: URL, headers and body.

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

use crate::backend::BackendStrategy;
use crate::errors::GenaiError;
use crate::http::common::{apply_sdk_headers, join_url};
use crate::payload::Payload;

/// Builds the absolute URL for a logical API path.
pub(crate) fn compose_url(
    backend: &dyn BackendStrategy,
    base_url: &str,
    api_version: &str,
    path: &str,
    method: &Method,
) -> Result<Url, GenaiError> {
    let full_path = backend.api_url_path(path, method, api_version);
    parse_url(&join_url(base_url, &full_path))
}

pub(crate) fn parse_url(url: &str) -> Result<Url, GenaiError> {
    Url::parse(url).map_err(|source| GenaiError::Url {
        url: url.to_string(),
        source,
    })
}

/// Call headers first, then the SDK set on top.
pub(crate) fn request_headers(
    backend: &dyn BackendStrategy,
    call_headers: &HeaderMap,
) -> Result<HeaderMap, GenaiError> {
    let mut headers = call_headers.clone();
    apply_sdk_headers(&mut headers, backend)?;
    Ok(headers)
}

/// JSON body for a non-empty payload; `None` otherwise.
pub(crate) fn encode_body(payload: &Payload) -> Result<Option<Vec<u8>>, GenaiError> {
    if payload.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_vec(payload)?))
    }
}

/// Assembles a `reqwest::Request`.
pub(crate) fn assemble(
    http: &reqwest::Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
) -> Result<reqwest::Request, GenaiError> {
    let mut builder = http.request(method, url).headers(headers);
    if let Some(body) = body {
        builder = builder.body(body);
    }
    builder
        .build()
        .map_err(|e| GenaiError::Internal(format!("failed to build request: {e}")))
}
