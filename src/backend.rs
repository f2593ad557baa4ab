//! Backend strategies.
//!
//! Everything that differs between the Gemini API and Vertex AI lives behind
//! [`BackendStrategy`]: resource naming, URL path composition, authentication
//! headers and the Live endpoint. The client picks one implementation when it
//! is built and never branches on the backend again.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

use crate::config::Backend;
use crate::errors::GenaiError;
use crate::http::common::API_KEY_HEADER;

/// API version of the Gemini Live service path.
const GEMINI_LIVE_API_VERSION: &str = "v1alpha";
/// API version of the Vertex AI Live service path.
const VERTEX_LIVE_API_VERSION: &str = "v1beta1";

/// Where and how to open a Live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEndpoint {
    /// Service path, starting with `/ws/`.
    pub path: String,
    /// Raw query string (without `?`), if any.
    pub query: Option<String>,
    /// Whether the connection needs an `Authorization: Bearer` header.
    pub bearer_auth: bool,
}

/// Backend-specific behavior.
///
/// Inputs are assumed non-empty; validation happens in
/// [`ResourceNamer`](crate::ResourceNamer) before these are called.
pub trait BackendStrategy: Send + Sync + std::fmt::Debug {
    fn backend(&self) -> Backend;

    /// Qualifies `name` within `collection`, where a fully qualified name
    /// inside the collection has `depth` segments.
    fn resource_name(&self, name: &str, collection: &str, depth: usize) -> String;

    /// Normalizes a model identifier.
    fn model(&self, model: &str) -> String;

    /// Expands a model identifier to the full resource path some endpoints need.
    fn model_full_name(&self, model: &str) -> String;

    /// Path of the model listing endpoint.
    fn models_url(&self, base_models: bool) -> &'static str;

    /// Reshapes embedding contents for the backend.
    fn contents_for_embed(&self, contents: Value) -> Result<Value, GenaiError>;

    /// Composes the URL path (everything after the base URL) for a request.
    fn api_url_path(&self, path: &str, method: &Method, api_version: &str) -> String;

    /// Adds the backend's static auth headers.
    fn apply_auth_headers(&self, headers: &mut HeaderMap) -> Result<(), GenaiError>;

    /// Whether HTTP requests carry a bearer token from the token source.
    fn uses_bearer_token(&self) -> bool;

    /// The Live endpoint. Its path version is fixed per backend.
    fn live_endpoint(&self) -> LiveEndpoint;
}

/// True when prepending `collection/` turns `name` into a fully qualified name.
fn should_prepend_collection(name: &str, collection: &str, depth: usize) -> bool {
    let prefix = format!("{collection}/");
    !name.starts_with(&prefix) && format!("{prefix}{name}").matches('/').count() + 1 == depth
}

/// The Gemini API, authenticated with an API key.
#[derive(Clone)]
pub struct GeminiApiBackend {
    api_key: Option<String>,
}

impl GeminiApiBackend {
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

impl std::fmt::Debug for GeminiApiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiApiBackend")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BackendStrategy for GeminiApiBackend {
    fn backend(&self) -> Backend {
        Backend::GeminiApi
    }

    fn resource_name(&self, name: &str, collection: &str, depth: usize) -> String {
        if should_prepend_collection(name, collection, depth) {
            format!("{collection}/{name}")
        } else {
            name.to_string()
        }
    }

    fn model(&self, model: &str) -> String {
        if model.starts_with("models/") || model.starts_with("tunedModels/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn model_full_name(&self, model: &str) -> String {
        self.model(model)
    }

    fn models_url(&self, base_models: bool) -> &'static str {
        if base_models { "models" } else { "tunedModels" }
    }

    fn contents_for_embed(&self, contents: Value) -> Result<Value, GenaiError> {
        Ok(contents)
    }

    fn api_url_path(&self, path: &str, _method: &Method, api_version: &str) -> String {
        if path.contains(&format!("/{api_version}/")) {
            path.to_string()
        } else {
            format!("{api_version}/{path}")
        }
    }

    fn apply_auth_headers(&self, headers: &mut HeaderMap) -> Result<(), GenaiError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(key)
                .map_err(|e| GenaiError::InvalidInput(format!("API key is not a valid header value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(())
    }

    fn uses_bearer_token(&self) -> bool {
        false
    }

    fn live_endpoint(&self) -> LiveEndpoint {
        LiveEndpoint {
            path: format!(
                "/ws/google.ai.generativelanguage.{GEMINI_LIVE_API_VERSION}.GenerativeService.BidiGenerateContent"
            ),
            query: self
                .api_key
                .as_deref()
                .map(|key| format!("key={}", urlencoding::encode(key))),
            bearer_auth: false,
        }
    }
}

/// Vertex AI, scoped to a project and location.
#[derive(Debug, Clone)]
pub struct VertexAiBackend {
    project: String,
    location: String,
}

impl VertexAiBackend {
    #[must_use]
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
        }
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    fn location_prefix(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }
}

impl BackendStrategy for VertexAiBackend {
    fn backend(&self) -> Backend {
        Backend::VertexAi
    }

    fn resource_name(&self, name: &str, collection: &str, depth: usize) -> String {
        if name.starts_with("projects/") {
            name.to_string()
        } else if name.starts_with("locations/") {
            format!("projects/{}/{name}", self.project)
        } else if name.starts_with(&format!("{collection}/")) {
            format!("{}/{name}", self.location_prefix())
        } else if should_prepend_collection(name, collection, depth) {
            format!("{}/{collection}/{name}", self.location_prefix())
        } else {
            name.to_string()
        }
    }

    fn model(&self, model: &str) -> String {
        if model.starts_with("projects/")
            || model.starts_with("models/")
            || model.starts_with("publishers/")
        {
            model.to_string()
        } else if let Some((publisher, name)) = model.split_once('/') {
            format!("publishers/{publisher}/models/{name}")
        } else {
            format!("publishers/google/models/{model}")
        }
    }

    fn model_full_name(&self, model: &str) -> String {
        let name = self.model(model);
        if name.starts_with("publishers/") {
            format!("{}/{name}", self.location_prefix())
        } else if name.starts_with("models/") {
            format!("{}/publishers/google/{name}", self.location_prefix())
        } else {
            name
        }
    }

    fn models_url(&self, base_models: bool) -> &'static str {
        if base_models {
            "publishers/google/models"
        } else {
            "models"
        }
    }

    fn contents_for_embed(&self, contents: Value) -> Result<Value, GenaiError> {
        let Value::Array(items) = contents else {
            return Err(GenaiError::InvalidInput(
                "contents for embedding must be a list".to_string(),
            ));
        };
        let mut texts = Vec::with_capacity(items.len());
        for content in &items {
            let first_part = content
                .get("parts")
                .and_then(Value::as_array)
                .and_then(|parts| parts.first())
                .ok_or_else(|| {
                    GenaiError::InvalidInput("content parts is not a non-empty list".to_string())
                })?;
            let text = first_part
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    GenaiError::InvalidInput("content part text is not a string".to_string())
                })?;
            texts.push(Value::String(text.to_string()));
        }
        Ok(Value::Array(texts))
    }

    fn api_url_path(&self, path: &str, method: &Method, api_version: &str) -> String {
        let base_model_listing = *method == Method::GET && path.starts_with("publishers/google/models");
        if path.starts_with("projects/") || base_model_listing {
            format!("{api_version}/{path}")
        } else {
            format!("{api_version}/{}/{path}", self.location_prefix())
        }
    }

    fn apply_auth_headers(&self, _headers: &mut HeaderMap) -> Result<(), GenaiError> {
        Ok(())
    }

    fn uses_bearer_token(&self) -> bool {
        true
    }

    fn live_endpoint(&self) -> LiveEndpoint {
        LiveEndpoint {
            path: format!(
                "/ws/google.cloud.aiplatform.{VERTEX_LIVE_API_VERSION}.LlmBidiService/BidiGenerateContent"
            ),
            query: None,
            bearer_auth: true,
        }
    }
}
