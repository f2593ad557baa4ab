//! Pull-based streaming responses.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use genai_transport::{Backend, CallContext, Client, Payload};
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), genai_transport::GenaiError> {
//! let client = Client::builder(Backend::GeminiApi).api_key("your-api-key").build()?;
//! let mut body = Payload::new();
//! body.insert("contents".into(), serde_json::json!([{"parts": [{"text": "Hi"}]}]));
//!
//! let mut stream = client
//!     .send_stream_request(
//!         "models/gemini-2.0-flash:streamGenerateContent?alt=sse",
//!         Method::POST,
//!         &body,
//!         None,
//!         &CallContext::new(),
//!         Ok,
//!     )
//!     .await?;
//!
//! while let Some(event) = stream.next().await {
//!     match event {
//!         Ok(payload) => println!("{payload:?}"),
//!         // a bad event does not end the stream
//!         Err(e) => eprintln!("skipping event: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use futures_util::stream::BoxStream;

use crate::errors::GenaiError;

/// A stream of decoded events from a server-streaming call.
///
/// The response body lives inside the stream. It is released exactly once:
/// when the stream is exhausted, when [`close`](Self::close) is called, or
/// when the stream is dropped.
pub struct ResponseStream<T> {
    inner: Option<BoxStream<'static, Result<T, GenaiError>>>,
}

impl<T> ResponseStream<T> {
    pub(crate) fn new(inner: BoxStream<'static, Result<T, GenaiError>>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Releases the response body. Later polls yield `None`.
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// Whether the body has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl<T> Stream for ResponseStream<T> {
    type Item = Result<T, GenaiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                self.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(inner) => inner.size_hint(),
            None => (0, Some(0)),
        }
    }
}

impl<T> std::fmt::Debug for ResponseStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}
