//! Wire-level JSON payloads.
//!
//! Requests and responses travel as [`Payload`] objects whose keys are the
//! exact JSON field names of the wire protocol. Typed request/response structs
//! cross into and out of this representation only through [`to_payload`] and
//! [`from_payload`].

use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::GenaiError;
use crate::http::error_helpers::format_json_parse_error;

/// A JSON object keyed by wire field names.
pub type Payload = Map<String, Value>;

/// Field added to unary responses carrying the raw response headers.
pub const HTTP_HEADERS_FIELD: &str = "httpHeaders";

/// Converts a typed value into a wire payload.
///
/// # Errors
///
/// Returns [`GenaiError::InvalidInput`] when the value does not serialize to a
/// JSON object.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Payload, GenaiError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(GenaiError::InvalidInput(format!(
            "payload must serialize to a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Converts a wire payload into a typed value.
///
/// # Errors
///
/// Returns [`GenaiError::Json`] when the payload does not match `T`.
pub fn from_payload<T: DeserializeOwned>(payload: Payload) -> Result<T, GenaiError> {
    serde_json::from_value(Value::Object(payload)).map_err(GenaiError::from)
}

/// Parses a response body into a payload. An empty body is an empty payload.
pub(crate) fn parse_object(body: &str) -> Result<Payload, GenaiError> {
    if body.trim().is_empty() {
        return Ok(Payload::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(GenaiError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(GenaiError::MalformedResponse(format_json_parse_error(body, e))),
    }
}

/// Renders response headers as `{ name: [values...] }`.
pub(crate) fn headers_to_value(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        out.insert(name.as_str().to_string(), Value::Array(values));
    }
    Value::Object(out)
}

pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
