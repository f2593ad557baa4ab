//! Error handling utilities for HTTP responses and error context formatting.

use reqwest::Response;
use serde::Deserialize;

use crate::errors::{ApiError, GenaiError};

/// Maximum characters to include from error body in context messages
const ERROR_BODY_PREVIEW_LENGTH: usize = 200;

/// Google's request ID header name.
///
/// The value can be used when contacting Google support or correlating with server logs.
/// See: <https://cloud.google.com/apis/docs/system-parameters>
pub(crate) const REQUEST_ID_HEADER: &str = "x-goog-request-id";

/// Wire envelope of an error response: `{"error": {...}}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

/// Checks if an HTTP response is successful, returning it if so or an error otherwise.
///
/// # Errors
///
/// Returns [`GenaiError::Api`] built from the response body on non-success status.
pub(crate) async fn check_response(response: Response) -> Result<Response, GenaiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(GenaiError::Api(read_error_with_context(response).await))
    }
}

/// Reads an error response body into an [`ApiError`].
///
/// The request ID header is captured before the body is consumed. A body
/// that cannot be read or parsed still produces an `ApiError`, carrying the
/// status line and a truncated preview of whatever came back.
pub(crate) async fn read_error_with_context(response: Response) -> ApiError {
    let status = response.status();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("Failed to read error body: {e}"),
    };

    let mut error = api_error_from_body(status.as_u16(), &status.to_string(), &body);
    error.request_id = request_id;
    error
}

/// Decodes an error body, falling back to the HTTP status when the body
/// carries no structured error.
pub(crate) fn api_error_from_body(code: u16, status_line: &str, body: &str) -> ApiError {
    let fallback = || ApiError {
        code: i32::from(code),
        status: status_line.to_string(),
        ..Default::default()
    };

    if body.trim().is_empty() {
        return fallback();
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { mut error }) => {
            if error.code == 0 {
                error.code = i32::from(code);
            }
            if error.status.is_empty() {
                error.status = status_line.to_string();
            }
            error
        }
        Err(_) => ApiError {
            message: truncate_for_context(body, ERROR_BODY_PREVIEW_LENGTH),
            ..fallback()
        },
    }
}

/// Formats JSON parsing context by including a preview of the raw JSON.
pub(crate) fn format_json_parse_error(json_str: &str, error: serde_json::Error) -> String {
    let preview = truncate_for_context(json_str, ERROR_BODY_PREVIEW_LENGTH);
    format!("JSON parse error: {error} | Context: {preview}")
}

/// Truncates a string to specified length, adding "..." if truncated.
///
/// Uses character-boundary-aware slicing to prevent panics on multi-byte UTF-8 characters.
pub(crate) fn truncate_for_context(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let truncate_at = s
            .char_indices()
            .take_while(|(i, c)| i + c.len_utf8() <= max_len)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}...", &s[..truncate_at])
    }
}
