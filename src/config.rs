//! Client-wide configuration: backend selection, HTTP options and base URLs.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::errors::GenaiError;

/// Environment variable overriding the Gemini API base URL.
pub const GEMINI_BASE_URL_ENV: &str = "GOOGLE_GEMINI_BASE_URL";

/// Environment variable overriding the Vertex AI base URL.
pub const VERTEX_BASE_URL_ENV: &str = "GOOGLE_VERTEX_BASE_URL";

/// The deployment surface a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// The Gemini API at generativelanguage.googleapis.com, authenticated by API key.
    GeminiApi,
    /// Vertex AI, scoped to a project and location, authenticated by bearer token.
    VertexAi,
}

impl Backend {
    /// API version used when none is configured.
    #[must_use]
    pub const fn default_api_version(self) -> &'static str {
        match self {
            Self::GeminiApi => "v1beta",
            Self::VertexAi => "v1beta1",
        }
    }
}

/// HTTP options applied to requests.
///
/// Client-wide options are set once on the builder. Per-call options are
/// merged over them with [`HttpOptions::merged_over`]; the client-wide value
/// is never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpOptions {
    /// Overrides the default host, e.g. `https://my-proxy.example.com/`.
    pub base_url: Option<String>,
    /// Path segment such as `v1beta`.
    pub api_version: Option<String>,
    /// Extra headers sent with every request.
    pub headers: HeaderMap,
}

impl HttpOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Adds a header.
    ///
    /// # Errors
    ///
    /// Returns [`GenaiError::InvalidInput`] if the name or value is not a valid header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, GenaiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| GenaiError::InvalidInput(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| GenaiError::InvalidInput(format!("invalid header value for '{name}': {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Returns these options layered over `defaults`.
    ///
    /// Each field set here (and non-empty) wins; headers merge by name with
    /// values from `self` replacing same-named defaults.
    #[must_use]
    pub fn merged_over(&self, defaults: &HttpOptions) -> HttpOptions {
        let pick = |call: &Option<String>, fallback: &Option<String>| {
            call.as_ref()
                .filter(|v| !v.is_empty())
                .or(fallback.as_ref())
                .cloned()
        };

        let mut headers = defaults.headers.clone();
        for name in self.headers.keys() {
            headers.remove(name);
            for value in self.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        HttpOptions {
            base_url: pick(&self.base_url, &defaults.base_url),
            api_version: pick(&self.api_version, &defaults.api_version),
            headers,
        }
    }
}

/// Process-level base URL defaults, one per backend.
///
/// Read once from the environment with [`BaseUrls::from_env`] (or built by
/// hand) and handed to the client builder. An explicit
/// [`HttpOptions::base_url`] always wins over these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseUrls {
    pub gemini: Option<String>,
    pub vertex: Option<String>,
}

impl BaseUrls {
    /// Reads `GOOGLE_GEMINI_BASE_URL` and `GOOGLE_VERTEX_BASE_URL`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            gemini: std::env::var(GEMINI_BASE_URL_ENV).ok(),
            vertex: std::env::var(VERTEX_BASE_URL_ENV).ok(),
        }
    }

    #[must_use]
    pub fn for_backend(&self, backend: Backend) -> Option<&str> {
        match backend {
            Backend::GeminiApi => self.gemini.as_deref(),
            Backend::VertexAi => self.vertex.as_deref(),
        }
    }
}
