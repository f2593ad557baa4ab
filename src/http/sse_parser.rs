//! Event-stream decoding.
//!
//! Streaming endpoints answer with `data:<json>` events separated by a blank
//! line (`\n\n` or `\r\n\r\n`). Bytes arrive in arbitrary chunks, so a
//! [`TokenScanner`] buffers them and hands out complete tokens; each token is
//! then decoded on its own. A bad token becomes an error item and decoding
//! carries on with the next one.

use async_stream::stream;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::Deadline;
use crate::errors::GenaiError;
use crate::http::error_helpers::format_json_parse_error;
use crate::http::loud_wire;
use crate::payload::{Payload, json_kind};

/// Hard ceiling on a single buffered token.
pub(crate) const MAX_TOKEN_SIZE: usize = 256 * 1024 * 1024;

/// Buffer capacity before the first chunk arrives.
const INITIAL_BUFFER_SIZE: usize = 1024;

/// Result of scanning buffered bytes for the next token.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Scan<'a> {
    /// A complete token. `advance` bytes (token plus delimiter) are consumed.
    Token { advance: usize, token: &'a [u8] },
    /// No delimiter yet; feed more bytes.
    NeedMore,
    /// End of input with nothing left over.
    Done,
}

fn drop_cr(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r").unwrap_or(data)
}

fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|w| w == needle)
}

/// Finds the next blank-line delimited token in `data`.
///
/// The earliest of `\n\n` and `\r\n\r\n` wins. At EOF any remaining bytes
/// form the final token.
pub(crate) fn scan(data: &[u8], at_eof: bool) -> Scan<'_> {
    if at_eof && data.is_empty() {
        return Scan::Done;
    }

    let lf = find(data, b"\n\n").map(|i| (i, 2));
    let crlf = find(data, b"\r\n\r\n").map(|i| (i, 4));
    let delimiter = match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    };

    match delimiter {
        Some((i, len)) => Scan::Token {
            advance: i + len,
            token: drop_cr(&data[..i]),
        },
        None if at_eof => Scan::Token {
            advance: data.len(),
            token: drop_cr(data),
        },
        None => Scan::NeedMore,
    }
}

/// Incremental tokenizer over a chunked byte stream.
#[derive(Debug)]
pub(crate) struct TokenScanner {
    buf: BytesMut,
    max_size: usize,
}

impl TokenScanner {
    pub(crate) fn new() -> Self {
        Self::with_max_size(MAX_TOKEN_SIZE)
    }

    pub(crate) fn with_max_size(max_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_SIZE.min(max_size)),
            max_size,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pops the next complete token, or the trailing remainder when `at_eof`.
    pub(crate) fn next_token(&mut self, at_eof: bool) -> Option<Bytes> {
        let (advance, len) = match scan(&self.buf, at_eof) {
            // token is always a prefix of the buffer
            Scan::Token { advance, token } => (advance, token.len()),
            Scan::NeedMore | Scan::Done => return None,
        };
        let consumed = self.buf.split_to(advance).freeze();
        Some(consumed.slice(..len))
    }

    /// True once the unterminated bytes outgrow the ceiling.
    pub(crate) fn is_over_limit(&self) -> bool {
        self.buf.len() > self.max_size
    }

    pub(crate) fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Decodes one token. Empty tokens produce nothing.
pub(crate) fn decode_token<T, F>(token: &[u8], converter: &F) -> Option<Result<T, GenaiError>>
where
    F: Fn(Payload) -> Result<T, GenaiError>,
{
    if token.is_empty() {
        return None;
    }

    let text = String::from_utf8_lossy(token);
    let Some((prefix, data)) = text.split_once(':') else {
        return Some(Err(GenaiError::Parse(format!("invalid stream chunk: {text}"))));
    };
    if prefix != "data" {
        return Some(Err(GenaiError::Parse(format!(
            "invalid stream chunk: {prefix}:{data}"
        ))));
    }

    let payload = match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            return Some(Err(GenaiError::Parse(format!(
                "stream event data must be a JSON object, got {}",
                json_kind(&other)
            ))));
        }
        Err(e) => return Some(Err(GenaiError::Parse(format_json_parse_error(data, e)))),
    };

    Some(converter(payload))
}

enum Pull {
    Chunk(Option<Result<Bytes, reqwest::Error>>),
    Cancelled,
    TimedOut(Duration),
}

async fn expire(deadline: Option<Deadline>) -> Duration {
    match deadline {
        Some(deadline) => deadline.expired().await,
        None => std::future::pending().await,
    }
}

/// Decodes an event-stream body into converted items.
///
/// The byte stream is owned by the returned stream and dropped when it ends,
/// so the response body is released on exhaustion, on cancellation or
/// timeout, on a read error, on an oversize event, and when the caller drops
/// the stream early.
pub(crate) fn decode_stream<T, F, S>(
    byte_stream: S,
    converter: F,
    cancel: CancellationToken,
    deadline: Option<Deadline>,
    max_token_size: usize,
    request_id: usize,
) -> impl Stream<Item = Result<T, GenaiError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(Payload) -> Result<T, GenaiError> + Send + Sync + 'static,
    T: Send + 'static,
{
    stream! {
        futures_util::pin_mut!(byte_stream);
        let mut scanner = TokenScanner::with_max_size(max_token_size);

        loop {
            let pull = tokio::select! {
                biased;
                () = cancel.cancelled() => Pull::Cancelled,
                limit = expire(deadline) => Pull::TimedOut(limit),
                next = byte_stream.next() => Pull::Chunk(next),
            };

            match pull {
                Pull::Cancelled => {
                    yield Err(GenaiError::Cancelled);
                    break;
                }
                Pull::TimedOut(limit) => {
                    yield Err(GenaiError::Timeout(limit));
                    break;
                }
                Pull::Chunk(Some(Ok(chunk))) => {
                    scanner.push(&chunk);
                    while let Some(token) = scanner.next_token(false) {
                        loud_wire::log_sse_chunk(request_id, &String::from_utf8_lossy(&token));
                        if let Some(item) = decode_token(&token, &converter) {
                            yield item;
                        }
                    }
                    if scanner.is_over_limit() {
                        warn!(
                            buffered = scanner.pending(),
                            limit = max_token_size,
                            "stream event is too large to process in streaming mode, use the unary call instead"
                        );
                        break;
                    }
                }
                Pull::Chunk(Some(Err(e))) => {
                    yield Err(GenaiError::Http(e));
                    break;
                }
                Pull::Chunk(None) => {
                    while let Some(token) = scanner.next_token(true) {
                        loud_wire::log_sse_chunk(request_id, &String::from_utf8_lossy(&token));
                        if let Some(item) = decode_token(&token, &converter) {
                            yield item;
                        }
                    }
                    break;
                }
            }
        }
    }
}
