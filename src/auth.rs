//! Bearer-token sources for Vertex AI.
//!
//! Credential acquisition lives outside this crate. The client only needs
//! something that can hand out an access token on demand.

use async_trait::async_trait;

use crate::errors::GenaiError;

/// Supplies OAuth access tokens.
///
/// Implementations must be safe to call from many tasks at once; the client
/// asks for a token on every Vertex AI request and on every Live connect.
#[async_trait]
pub trait TokenSource: Send + Sync + std::fmt::Debug {
    /// Returns a currently valid access token.
    async fn token(&self) -> Result<String, GenaiError>;
}

/// A token source that always returns the same token.
///
/// Useful for short-lived tools and tests.
#[derive(Clone)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String, GenaiError> {
        if self.token.is_empty() {
            return Err(GenaiError::Auth("static token is empty".to_string()));
        }
        Ok(self.token.clone())
    }
}
