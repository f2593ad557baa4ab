use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use tokio::io::AsyncRead;
use tracing::debug;

use crate::auth::TokenSource;
use crate::backend::{BackendStrategy, GeminiApiBackend, VertexAiBackend};
use crate::config::{Backend, BaseUrls, HttpOptions};
use crate::context::CallContext;
use crate::errors::GenaiError;
use crate::files::File;
use crate::http::common::{GEMINI_DEFAULT_BASE_URL, vertex_default_base_url};
use crate::http::{loud_wire, request, sse_parser, transport, upload};
use crate::live::Live;
use crate::payload::Payload;
use crate::resource_names::ResourceNamer;
use crate::streaming::ResponseStream;

/// Options after merging a call's overrides over the client defaults.
struct Resolved {
    base_url: String,
    api_version: String,
    headers: HeaderMap,
}

struct ClientInner {
    http: ReqwestClient,
    backend: Box<dyn BackendStrategy>,
    token_source: Option<Arc<dyn TokenSource>>,
    /// Client-wide defaults; `base_url` and `api_version` are always set.
    http_options: HttpOptions,
}

/// The client for the Gemini API and Vertex AI.
///
/// Configuration is fixed at build time and shared behind an `Arc`, so
/// clones are cheap and every clone sees the same settings.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.inner.backend)
            .field("base_url", &self.base_url())
            .field("api_version", &self.api_version())
            .field("token_source", &self.inner.token_source)
            .finish_non_exhaustive()
    }
}

/// Builder for `Client` instances.
///
/// # Example
///
/// ```
/// use genai_transport::{Backend, BaseUrls, Client, StaticTokenSource};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let gemini = Client::builder(Backend::GeminiApi)
///     .api_key("api_key")
///     .timeout(Duration::from_secs(120))
///     .build()
///     .unwrap();
///
/// let vertex = Client::builder(Backend::VertexAi)
///     .project("my-project")
///     .location("us-central1")
///     .token_source(Arc::new(StaticTokenSource::new("ya29.token")))
///     .base_urls(BaseUrls::from_env())
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct ClientBuilder {
    backend: Backend,
    api_key: Option<String>,
    project: Option<String>,
    location: Option<String>,
    token_source: Option<Arc<dyn TokenSource>>,
    http_options: HttpOptions,
    base_urls: BaseUrls,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<ReqwestClient>,
}

impl ClientBuilder {
    /// API key for the Gemini API.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Google Cloud project for Vertex AI.
    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Google Cloud location for Vertex AI, e.g. `us-central1`.
    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Source of bearer tokens for Vertex AI requests and Live sessions.
    #[must_use]
    pub fn token_source(mut self, token_source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(token_source);
        self
    }

    /// Client-wide HTTP options. Per-call options are merged over these.
    #[must_use]
    pub fn http_options(mut self, http_options: HttpOptions) -> Self {
        self.http_options = http_options;
        self
    }

    /// Base URL defaults consulted when `http_options` sets no base URL.
    #[must_use]
    pub fn base_urls(mut self, base_urls: BaseUrls) -> Self {
        self.base_urls = base_urls;
        self
    }

    /// Sets the total request timeout.
    ///
    /// This is the maximum time a request can take from start to finish,
    /// including connection time, sending the request, and receiving the response.
    /// It applies to every request this client sends, streaming included, and
    /// is enforced by the HTTP client itself. For a bound on a single call use
    /// [`CallContext::with_timeout`], which also ends a stalled stream with
    /// [`GenaiError::Timeout`].
    ///
    /// Ignored when a custom [`http_client`](Self::http_client) is supplied.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// Ignored when a custom [`http_client`](Self::http_client) is supplied.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Uses a preconfigured `reqwest::Client` (proxies, custom TLS roots...).
    #[must_use]
    pub fn http_client(mut self, http_client: ReqwestClient) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Builds the `Client`.
    ///
    /// # Errors
    ///
    /// - [`GenaiError::InvalidInput`] when the Gemini API has no API key, or
    ///   Vertex AI lacks a project or location.
    /// - [`GenaiError::ClientBuild`] when the HTTP client cannot be built.
    pub fn build(self) -> Result<Client, GenaiError> {
        let (backend, default_base_url): (Box<dyn BackendStrategy>, String) = match self.backend {
            Backend::GeminiApi => {
                if self.api_key.as_deref().is_none_or(str::is_empty) {
                    return Err(GenaiError::InvalidInput(
                        "an API key is required for the Gemini API".to_string(),
                    ));
                }
                (
                    Box::new(GeminiApiBackend::new(self.api_key)),
                    GEMINI_DEFAULT_BASE_URL.to_string(),
                )
            }
            Backend::VertexAi => {
                let project = self.project.filter(|p| !p.is_empty()).ok_or_else(|| {
                    GenaiError::InvalidInput("a project is required for Vertex AI".to_string())
                })?;
                let location = self.location.filter(|l| !l.is_empty()).ok_or_else(|| {
                    GenaiError::InvalidInput("a location is required for Vertex AI".to_string())
                })?;
                let default_base_url = vertex_default_base_url(&location);
                (Box::new(VertexAiBackend::new(project, location)), default_base_url)
            }
        };

        let mut http_options = self.http_options;
        if http_options.base_url.as_deref().is_none_or(str::is_empty) {
            let injected = self
                .base_urls
                .for_backend(self.backend)
                .filter(|url| !url.is_empty());
            http_options.base_url = Some(injected.map_or(default_base_url, String::from));
        }
        if http_options.api_version.as_deref().is_none_or(str::is_empty) {
            http_options.api_version = Some(self.backend.default_api_version().to_string());
        }

        let http = match self.http_client {
            Some(http) => http,
            None => {
                let mut builder = ReqwestClient::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                if let Some(connect_timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(connect_timeout);
                }
                builder
                    .build()
                    .map_err(|e| GenaiError::ClientBuild(e.to_string()))?
            }
        };

        debug!(backend = ?self.backend, base_url = ?http_options.base_url, "Client built");

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                backend,
                token_source: self.token_source,
                http_options,
            }),
        })
    }
}

impl Client {
    /// Creates a new builder for `Client` instances.
    #[must_use]
    pub fn builder(backend: Backend) -> ClientBuilder {
        ClientBuilder {
            backend,
            api_key: None,
            project: None,
            location: None,
            token_source: None,
            http_options: HttpOptions::default(),
            base_urls: BaseUrls::default(),
            timeout: None,
            connect_timeout: None,
            http_client: None,
        }
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.inner.backend.backend()
    }

    /// Identifier transforms for this client's backend.
    #[must_use]
    pub fn names(&self) -> ResourceNamer<'_> {
        ResourceNamer::new(self.inner.backend.as_ref())
    }

    /// Client-wide HTTP options, with base URL and API version resolved.
    #[must_use]
    pub fn http_options(&self) -> &HttpOptions {
        &self.inner.http_options
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.inner.http_options.base_url.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        self.inner.http_options.api_version.as_deref().unwrap_or_default()
    }

    /// Entry point for realtime sessions.
    #[must_use]
    pub fn live(&self) -> Live {
        Live::new(self.clone())
    }

    pub(crate) fn strategy(&self) -> &dyn BackendStrategy {
        self.inner.backend.as_ref()
    }

    pub(crate) fn token_source(&self) -> Option<&Arc<dyn TokenSource>> {
        self.inner.token_source.as_ref()
    }

    fn resolve(&self, options: Option<&HttpOptions>) -> Resolved {
        let merged = match options {
            Some(call) => call.merged_over(&self.inner.http_options),
            None => self.inner.http_options.clone(),
        };
        Resolved {
            base_url: merged.base_url.unwrap_or_else(|| self.base_url().to_string()),
            api_version: merged
                .api_version
                .unwrap_or_else(|| self.api_version().to_string()),
            headers: merged.headers,
        }
    }

    /// Builds the HTTP request for a logical API path.
    ///
    /// `path` is relative to the API version (`models/x:generateContent`,
    /// `cachedContents`); backend-specific prefixes are added here. The
    /// bearer token, when one applies, is attached at send time.
    ///
    /// # Errors
    ///
    /// [`GenaiError::Url`] when the composed URL does not parse.
    pub fn build_request(
        &self,
        path: &str,
        payload: &Payload,
        method: Method,
        options: Option<&HttpOptions>,
    ) -> Result<reqwest::Request, GenaiError> {
        let resolved = self.resolve(options);
        let url = request::compose_url(
            self.strategy(),
            &resolved.base_url,
            &resolved.api_version,
            path,
            &method,
        )?;
        let headers = request::request_headers(self.strategy(), &resolved.headers)?;
        let body = request::encode_body(payload)?;
        request::assemble(&self.inner.http, method, url, headers, body)
    }

    /// Adds `Authorization: Bearer` for backends that use it.
    async fn authorize(&self, headers: &mut HeaderMap) -> Result<(), GenaiError> {
        if !self.inner.backend.uses_bearer_token() {
            return Ok(());
        }
        let Some(source) = &self.inner.token_source else {
            return Ok(());
        };
        let token = source.token().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| GenaiError::Auth(format!("token is not a valid header value: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn send(
        &self,
        path: &str,
        method: Method,
        payload: &Payload,
        options: Option<&HttpOptions>,
        ctx: &CallContext,
        request_id: usize,
    ) -> Result<reqwest::Response, GenaiError> {
        let mut request = self.build_request(path, payload, method, options)?;
        ctx.run(self.authorize(request.headers_mut())).await?;
        transport::execute(&self.inner.http, request, ctx, request_id).await
    }

    /// Sends a unary request and returns the response payload.
    ///
    /// The payload carries an extra `httpHeaders` field with the response
    /// headers.
    ///
    /// # Errors
    ///
    /// [`GenaiError::Api`] for non-2xx responses; transport, cancellation,
    /// timeout and decoding errors otherwise.
    pub async fn send_request(
        &self,
        path: &str,
        method: Method,
        payload: &Payload,
        options: Option<&HttpOptions>,
        ctx: &CallContext,
    ) -> Result<Payload, GenaiError> {
        let request_id = loud_wire::next_request_id();
        let response = self.send(path, method, payload, options, ctx, request_id).await?;
        ctx.run(transport::read_unary(response, request_id)).await
    }

    /// Sends a server-streaming request.
    ///
    /// Each `data:` event is parsed into a [`Payload`] and handed to
    /// `converter`. Malformed events and converter failures surface as error
    /// items without ending the stream. A timeout on `ctx` is a deadline for
    /// the whole call; once it passes, the stream yields
    /// [`GenaiError::Timeout`] and ends.
    ///
    /// # Errors
    ///
    /// Fails before any item is produced when the request cannot be sent or
    /// the status is not 2xx.
    pub async fn send_stream_request<T, F>(
        &self,
        path: &str,
        method: Method,
        payload: &Payload,
        options: Option<&HttpOptions>,
        ctx: &CallContext,
        converter: F,
    ) -> Result<ResponseStream<T>, GenaiError>
    where
        F: Fn(Payload) -> Result<T, GenaiError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let deadline = ctx.deadline();
        let request_id = loud_wire::next_request_id();
        let response = self.send(path, method, payload, options, ctx, request_id).await?;
        let events = sse_parser::decode_stream(
            response.bytes_stream(),
            converter,
            ctx.cancellation_token().clone(),
            deadline,
            sse_parser::MAX_TOKEN_SIZE,
            request_id,
        );
        Ok(ResponseStream::new(events.boxed()))
    }

    /// Uploads `upload_size` bytes from `reader` to a resumable upload session.
    ///
    /// `upload_url` is the session URL returned when the upload was started.
    /// An `upload_size` of zero sends a single empty finalize chunk.
    ///
    /// # Errors
    ///
    /// - [`GenaiError::Upload`] on a short read or when the server never
    ///   reports the upload as `final`.
    /// - [`GenaiError::MalformedResponse`] when the last response has no `file`.
    pub async fn upload_file<R>(
        &self,
        reader: &mut R,
        upload_url: &str,
        upload_size: u64,
        options: Option<&HttpOptions>,
        ctx: &CallContext,
    ) -> Result<File, GenaiError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let url = request::parse_url(upload_url)?;
        let resolved = self.resolve(options);
        let mut headers = request::request_headers(self.strategy(), &resolved.headers)?;
        ctx.run(self.authorize(&mut headers)).await?;

        let mut last = upload::upload_chunks(
            &self.inner.http,
            reader,
            &url,
            upload_size,
            &headers,
            upload::UPLOAD_CHUNK_SIZE,
            ctx,
        )
        .await?;

        let file = last.remove("file").ok_or_else(|| {
            GenaiError::MalformedResponse("upload response has no 'file' field".to_string())
        })?;
        Ok(serde_json::from_value(file)?)
    }

    /// Uploads a file from disk; the size comes from its metadata.
    ///
    /// # Errors
    ///
    /// [`GenaiError::InvalidInput`] when the file cannot be opened, plus
    /// everything [`upload_file`](Self::upload_file) returns.
    pub async fn upload_file_from_path(
        &self,
        path: impl AsRef<Path>,
        upload_url: &str,
        options: Option<&HttpOptions>,
        ctx: &CallContext,
    ) -> Result<File, GenaiError> {
        let path = path.as_ref();
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            GenaiError::InvalidInput(format!("cannot open '{}': {e}", path.display()))
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|e| {
                GenaiError::InvalidInput(format!("cannot read metadata of '{}': {e}", path.display()))
            })?
            .len();
        self.upload_file(&mut file, upload_url, size, options, ctx).await
    }
}
