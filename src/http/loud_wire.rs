//! Wire-level debugging via LOUD_WIRE environment variable.
//!
//! When `LOUD_WIRE` is set to any value, prints raw JSON of requests,
//! responses, stream chunks, upload chunks and Live frames to stderr with
//! pretty formatting and colors.
//!
//! # Usage
//!
//! ```bash
//! LOUD_WIRE=1 cargo test --test live_tests
//! ```
//!
//! # Output Format
//!
//! - Green `>>>` for outgoing traffic
//! - Red `<<<` for incoming traffic
//! - Blue for stream chunks, magenta for Live frames
//! - Timestamps and request IDs for correlation
//!
//! Base64-encoded media content is truncated to keep output readable.

use colored::Colorize;
use serde_json::Value;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Request ID counter for correlating requests with responses
static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Cached check for whether LOUD_WIRE is enabled
static ENABLED: OnceLock<bool> = OnceLock::new();

/// Check if LOUD_WIRE debugging is enabled.
///
/// Cached after the first check; `LOUD_WIRE` must be set before the first
/// call is made.
#[must_use]
pub(crate) fn is_enabled() -> bool {
    *ENABLED.get_or_init(|| std::env::var("LOUD_WIRE").is_ok())
}

/// Get the next request ID for correlation.
#[must_use]
pub(crate) fn next_request_id() -> usize {
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Fields that should have their values truncated if too long.
/// These typically contain base64-encoded binary data.
const TRUNCATE_FIELDS: &[&str] = &["data", "signature"];

/// Maximum length before truncation (keep first 100 chars).
const TRUNCATE_THRESHOLD: usize = 100;

/// Raw (non-JSON) bodies are cut at this many bytes.
const RAW_PREVIEW_LIMIT: usize = 1000;

/// Walks the JSON tree and truncates long `"data"` and `"signature"` strings.
fn truncate_long_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if TRUNCATE_FIELDS.contains(&key.as_str()) {
                    if let Value::String(s) = val
                        && s.len() > TRUNCATE_THRESHOLD
                        && s.is_char_boundary(TRUNCATE_THRESHOLD)
                    {
                        *s = format!("{}...", &s[..TRUNCATE_THRESHOLD]);
                    }
                } else {
                    truncate_long_fields(val);
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                truncate_long_fields(item);
            }
        }
        _ => {}
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Log prefix with timestamp and request ID.
fn prefix(request_id: usize) -> String {
    let ts = timestamp().dimmed();
    format!(
        "{} {} {}",
        "[LOUD_WIRE]".bold(),
        ts,
        format!("[REQ#{request_id}]").cyan()
    )
}

fn raw_preview(text: &str) -> String {
    crate::http::error_helpers::truncate_for_context(text, RAW_PREVIEW_LIMIT)
}

/// Prints `text` as colored JSON when it parses, raw otherwise.
fn print_payload(prefix: &str, label: &str, text: &str) {
    match serde_json::from_str::<Value>(text) {
        Ok(mut parsed) => {
            truncate_long_fields(&mut parsed);
            eprintln!("{prefix} {label}:");
            let rendered = colored_json::to_colored_json_auto(&parsed)
                .or_else(|_| serde_json::to_string_pretty(&parsed));
            if let Ok(rendered) = rendered {
                for line in rendered.lines() {
                    eprintln!("{prefix} {line}");
                }
            }
        }
        Err(_) => eprintln!("{prefix} {label}: {}", raw_preview(text)),
    }
}

/// Log an outgoing HTTP request.
pub(crate) fn log_request(request_id: usize, method: &str, url: &str, body: Option<&[u8]>) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    eprintln!("{prefix} {} {method} {url}", ">>>".green().bold());

    if let Some(body) = body.filter(|b| !b.is_empty()) {
        print_payload(&prefix, &"Body".green().to_string(), &String::from_utf8_lossy(body));
    }
}

/// Log an incoming HTTP response status.
pub(crate) fn log_response_status(request_id: usize, status: u16) {
    if !is_enabled() {
        return;
    }

    let status_text = if status < 300 {
        format!("{status} OK").green()
    } else {
        format!("{status} ERROR").red()
    };
    eprintln!("{} {} {status_text}", prefix(request_id), "<<<".red().bold());
}

/// Log an incoming HTTP response body.
pub(crate) fn log_response_body(request_id: usize, body: &str) {
    if !is_enabled() {
        return;
    }
    print_payload(&prefix(request_id), &"Response".red().to_string(), body);
}

/// Log one event-stream token.
pub(crate) fn log_sse_chunk(request_id: usize, token: &str) {
    if !is_enabled() {
        return;
    }
    print_payload(&prefix(request_id), &"SSE".blue().bold().to_string(), token);
}

/// Log the start of a chunked upload.
pub(crate) fn log_upload_start(request_id: usize, upload_url: &str, size: u64) {
    if !is_enabled() {
        return;
    }

    #[allow(clippy::cast_precision_loss)]
    let size_mb = size as f64 / 1_048_576.0;
    eprintln!(
        "{} {} {} {upload_url} ({size_mb:.2} MB)",
        prefix(request_id),
        ">>>".green().bold(),
        "UPLOAD".green().bold()
    );
}

/// Log one upload chunk.
pub(crate) fn log_upload_chunk(request_id: usize, command: &str, offset: u64, len: usize) {
    if !is_enabled() {
        return;
    }

    eprintln!(
        "{} {} {} [{command}] offset={offset} bytes={len}",
        prefix(request_id),
        ">>>".green().bold(),
        "CHUNK".green()
    );
}

/// Log upload completion.
pub(crate) fn log_upload_complete(request_id: usize, file_uri: &str) {
    if !is_enabled() {
        return;
    }

    eprintln!(
        "{} {} {} {file_uri}",
        prefix(request_id),
        "<<<".red().bold(),
        "UPLOADED".green().bold()
    );
}

/// Log a Live handshake target. The URL must already be free of credentials.
pub(crate) fn log_ws_connect(request_id: usize, url: &str) {
    if !is_enabled() {
        return;
    }
    eprintln!(
        "{} {} {} {url}",
        prefix(request_id),
        ">>>".green().bold(),
        "WS CONNECT".magenta().bold()
    );
}

/// Log an outgoing Live frame.
pub(crate) fn log_ws_send(request_id: usize, frame: &str) {
    if !is_enabled() {
        return;
    }
    let label = format!("{} {}", ">>>".green().bold(), "WS".magenta().bold());
    print_payload(&prefix(request_id), &label, frame);
}

/// Log an incoming Live frame.
pub(crate) fn log_ws_receive(request_id: usize, frame: &str) {
    if !is_enabled() {
        return;
    }
    let label = format!("{} {}", "<<<".red().bold(), "WS".magenta().bold());
    print_payload(&prefix(request_id), &label, frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_short_data() {
        let mut value = json!({"data": "short"});
        truncate_long_fields(&mut value);
        assert_eq!(value["data"], "short");
    }

    #[test]
    fn test_truncate_long_data() {
        let mut value = json!({"data": "A".repeat(200)});
        truncate_long_fields(&mut value);

        let result = value["data"].as_str().unwrap();
        assert_eq!(result.len(), 103, "Should be 100 chars + '...'");
        assert!(result.starts_with(&"A".repeat(100)));
    }

    #[test]
    fn test_truncate_preserves_text() {
        let long_text = "Hello world! ".repeat(50);
        let mut value = json!({
            "text": long_text.clone(),
            "data": "A".repeat(200)
        });
        truncate_long_fields(&mut value);

        assert_eq!(value["text"], long_text);
        assert!(value["data"].as_str().unwrap().ends_with("..."));
    }

    #[test]
    fn test_truncate_nested_in_realtime_input() {
        let mut value = json!({
            "realtimeInput": {"mediaChunks": [{"mimeType": "audio/pcm", "data": "C".repeat(150)}]}
        });
        truncate_long_fields(&mut value);
        assert!(
            value["realtimeInput"]["mediaChunks"][0]["data"]
                .as_str()
                .unwrap()
                .ends_with("...")
        );
        assert_eq!(value["realtimeInput"]["mediaChunks"][0]["mimeType"], "audio/pcm");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), 20, "Timestamp should be 20 chars: {ts}");
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }

    #[test]
    fn test_request_id_increments() {
        let id1 = next_request_id();
        let id2 = next_request_id();
        assert!(id2 > id1);
    }
}
