//! Backend-aware resource and model naming.
//!
//! Callers may pass short names (`gemini-2.0-flash`, `abc123`) or fully
//! qualified ones; [`ResourceNamer`] turns either into the form the
//! configured backend expects. Already-qualified names pass through
//! unchanged.

use serde_json::Value;
use tracing::warn;

use crate::backend::BackendStrategy;
use crate::config::Backend;
use crate::errors::GenaiError;
use crate::payload::json_kind;

/// Collection holding cached contents.
pub const CACHED_CONTENTS_COLLECTION: &str = "cachedContents";

/// Resolves identifiers for one client's backend.
///
/// Obtained from [`Client::names`](crate::Client::names).
#[derive(Clone, Copy)]
pub struct ResourceNamer<'a> {
    backend: &'a dyn BackendStrategy,
}

impl std::fmt::Debug for ResourceNamer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceNamer")
            .field("backend", &self.backend.backend())
            .finish()
    }
}

fn non_empty<'v>(value: &'v str, what: &str) -> Result<&'v str, GenaiError> {
    if value.is_empty() {
        Err(GenaiError::InvalidInput(format!("{what} is empty")))
    } else {
        Ok(value)
    }
}

fn as_name<'v>(value: &'v Value, what: &str) -> Result<&'v str, GenaiError> {
    value.as_str().ok_or_else(|| {
        GenaiError::InvalidInput(format!("{what} must be a string, got {}", json_kind(value)))
    })
}

impl<'a> ResourceNamer<'a> {
    pub(crate) fn new(backend: &'a dyn BackendStrategy) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend.backend()
    }

    /// Qualifies `name` within `collection`.
    ///
    /// `depth` is the number of `/`-separated segments a fully qualified name
    /// has inside the collection (2 for `cachedContents/<id>`).
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when `name` is empty.
    pub fn resource_name(
        &self,
        name: &str,
        collection: &str,
        depth: usize,
    ) -> Result<String, GenaiError> {
        let name = non_empty(name, "resource name")?;
        Ok(self.backend.resource_name(name, collection, depth))
    }

    /// [`resource_name`](Self::resource_name) over an untyped payload value.
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when the value is not a non-empty string.
    pub fn resource_name_value(
        &self,
        name: &Value,
        collection: &str,
        depth: usize,
    ) -> Result<String, GenaiError> {
        self.resource_name(as_name(name, "resource name")?, collection, depth)
    }

    /// Qualifies a cached content name.
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when `name` is empty.
    pub fn cached_content_name(&self, name: &str) -> Result<String, GenaiError> {
        self.resource_name(name, CACHED_CONTENTS_COLLECTION, 2)
    }

    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when the value is not a non-empty string.
    pub fn cached_content_name_value(&self, name: &Value) -> Result<String, GenaiError> {
        self.cached_content_name(as_name(name, "cached content name")?)
    }

    /// Normalizes a model identifier.
    ///
    /// | input              | Gemini API                | Vertex AI                               |
    /// |--------------------|---------------------------|-----------------------------------------|
    /// | `gemini-2.0-flash` | `models/gemini-2.0-flash` | `publishers/google/models/gemini-2.0-flash` |
    /// | `meta/llama3`      | `models/meta/llama3`      | `publishers/meta/models/llama3`         |
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when `model` is empty.
    pub fn model(&self, model: &str) -> Result<String, GenaiError> {
        Ok(self.backend.model(non_empty(model, "model")?))
    }

    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when the value is not a non-empty string.
    pub fn model_value(&self, model: &Value) -> Result<String, GenaiError> {
        self.model(as_name(model, "model")?)
    }

    /// Expands a model to its full resource path.
    ///
    /// On Vertex AI this yields
    /// `projects/<p>/locations/<l>/publishers/<publisher>/models/<name>`;
    /// on the Gemini API it matches [`model`](Self::model).
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when `model` is empty.
    pub fn model_full_name(&self, model: &str) -> Result<String, GenaiError> {
        Ok(self.backend.model_full_name(non_empty(model, "model")?))
    }

    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when the value is not a non-empty string.
    pub fn model_full_name_value(&self, model: &Value) -> Result<String, GenaiError> {
        self.model_full_name(as_name(model, "model")?)
    }

    /// Model name as the caches endpoint expects it.
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when `model` is empty.
    pub fn caches_model(&self, model: &str) -> Result<String, GenaiError> {
        self.model_full_name(model)
    }

    /// Path of the model listing endpoint: base models or tuned models.
    #[must_use]
    pub fn models_url(&self, base_models: bool) -> &'static str {
        self.backend.models_url(base_models)
    }

    /// Picks the model list out of a list-models response.
    ///
    /// Looks for `models`, `tunedModels` and `publisherModels` in that order.
    /// A response with none of them yields an empty list.
    ///
    /// # Errors
    ///
    /// [`GenaiError::MalformedResponse`] when the response is not a JSON object.
    pub fn extract_models(&self, response: &Value) -> Result<Value, GenaiError> {
        let Some(object) = response.as_object() else {
            return Err(GenaiError::MalformedResponse(format!(
                "list models response must be an object, got {}",
                json_kind(response)
            )));
        };

        for key in ["models", "tunedModels", "publisherModels"] {
            if let Some(models) = object.get(key) {
                return Ok(models.clone());
            }
        }

        warn!("Cannot find the models type (models, tunedModels, publisherModels) in the response");
        Ok(Value::Array(Vec::new()))
    }

    /// Reshapes embedding contents for the backend.
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when Vertex AI contents are not a list of
    /// contents whose first part carries text.
    pub fn contents_for_embed(&self, contents: Value) -> Result<Value, GenaiError> {
        self.backend.contents_for_embed(contents)
    }
}
