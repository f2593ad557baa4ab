//! Per-call cancellation and timeouts.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::GenaiError;

/// Cancellation scope for a single call.
///
/// Every network wait made on behalf of the call races against the
/// cancellation token and, when set, the timeout. For streaming calls the
/// timeout is a deadline measured from the start of the call: it covers the
/// request and every body read after it, and an expired deadline ends the
/// stream with [`GenaiError::Timeout`].
///
/// ```
/// use genai_transport::CallContext;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = CallContext::new()
///     .with_cancellation(token.clone())
///     .with_timeout(Duration::from_secs(30));
/// // token.cancel() from another task aborts the call with GenaiError::Cancelled
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl CallContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The timeout pinned to now, if one is set.
    pub(crate) fn deadline(&self) -> Option<Deadline> {
        self.timeout.map(|limit| Deadline {
            at: Instant::now() + limit,
            limit,
        })
    }

    /// Drives `fut` unless the context is cancelled or times out first.
    pub(crate) async fn run<F, T>(&self, fut: F) -> Result<T, GenaiError>
    where
        F: Future<Output = Result<T, GenaiError>>,
    {
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| GenaiError::Timeout(limit))?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(GenaiError::Cancelled),
            result = bounded => result,
        }
    }
}

/// A call timeout fixed to the instant the call started.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// Resolves once the deadline passes, yielding the configured timeout.
    pub(crate) async fn expired(self) -> Duration {
        tokio::time::sleep_until(self.at).await;
        self.limit
    }
}
