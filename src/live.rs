//! Realtime (Live) sessions over WebSocket.
//!
//! A session is opened with [`Live::connect`], which performs the WebSocket
//! handshake and sends the `setup` message. After that the caller drives the
//! conversation with [`Session::send`] and [`Session::receive`]; one send and
//! one receive may be in flight at the same time.
//!
//! # Example
//!
//! ```no_run
//! use genai_transport::{Backend, CallContext, Client, LiveClientMessage, LiveConnectConfig};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), genai_transport::GenaiError> {
//! let client = Client::builder(Backend::GeminiApi).api_key("your-api-key").build()?;
//! let config = LiveConnectConfig::new()
//!     .with_generation_config(json!({"responseModalities": ["TEXT"]}));
//!
//! let session = client
//!     .live()
//!     .connect("gemini-2.0-flash-live-001", Some(&config), &CallContext::new())
//!     .await?;
//!
//! session
//!     .send(&LiveClientMessage::client_content(json!({
//!         "turns": [{"role": "user", "parts": [{"text": "Hello"}]}],
//!         "turnComplete": true
//!     })))
//!     .await?;
//!
//! loop {
//!     let message = session.receive().await?;
//!     if message.is_turn_complete() {
//!         break;
//!     }
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument, warn};

use crate::client::Client;
use crate::context::CallContext;
use crate::errors::GenaiError;
use crate::http::loud_wire;
use crate::http::request::parse_url;
use crate::payload::Payload;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Optional settings sent with the `setup` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveConnectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

impl LiveConnectConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_generation_config(mut self, generation_config: Value) -> Self {
        self.generation_config = Some(generation_config);
        self
    }

    #[must_use]
    pub fn with_system_instruction(mut self, system_instruction: Value) -> Self {
        self.system_instruction = Some(system_instruction);
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// The first message of every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveClientSetup {
    /// Fully qualified model name.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

/// A message from the client. Exactly one field is normally set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveClientMessage {
    /// Only sent by [`Live::connect`]; [`Session::send`] rejects it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<LiveClientSetup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<Value>,
}

impl LiveClientMessage {
    /// Conversation turns, e.g. `{"turns": [...], "turnComplete": true}`.
    #[must_use]
    pub fn client_content(content: Value) -> Self {
        Self {
            client_content: Some(content),
            ..Default::default()
        }
    }

    /// Streaming media input, e.g. `{"mediaChunks": [...]}`.
    #[must_use]
    pub fn realtime_input(input: Value) -> Self {
        Self {
            realtime_input: Some(input),
            ..Default::default()
        }
    }

    /// Results for a server `toolCall`.
    #[must_use]
    pub fn tool_response(response: Value) -> Self {
        Self {
            tool_response: Some(response),
            ..Default::default()
        }
    }
}

/// A message from the server.
///
/// Fields this type does not name are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_cancellation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<Value>,
    /// The server is about to disconnect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_away: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_resumption_update: Option<Value>,
    #[serde(flatten)]
    pub extra: Payload,
}

impl LiveServerMessage {
    #[must_use]
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// True when `serverContent.turnComplete` is set.
    #[must_use]
    pub fn is_turn_complete(&self) -> bool {
        self.server_content
            .as_ref()
            .and_then(|c| c.get("turnComplete"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// An application-level error reported inside the message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Value> {
        self.extra.get("error")
    }
}

/// Entry point for Live sessions, obtained from [`Client::live`].
#[derive(Debug, Clone)]
pub struct Live {
    client: Client,
}

impl Live {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Opens a session and sends the `setup` message.
    ///
    /// Does not wait for `setupComplete`; it arrives as the first
    /// [`Session::receive`] result.
    ///
    /// # Errors
    ///
    /// - [`GenaiError::InvalidInput`] for an empty model.
    /// - [`GenaiError::Auth`] when Vertex AI has no token source.
    /// - [`GenaiError::Connect`] when the handshake fails.
    /// - [`GenaiError::Cancelled`] / [`GenaiError::Timeout`] from `ctx`.
    #[instrument(skip(self, config, ctx), fields(backend = ?self.client.backend()))]
    pub async fn connect(
        &self,
        model: &str,
        config: Option<&LiveConnectConfig>,
        ctx: &CallContext,
    ) -> Result<Session, GenaiError> {
        let model = self.client.names().model_full_name(model)?;
        let url = self.websocket_url()?;
        let display_url = display_url(&url);
        let headers = ctx.run(self.handshake_headers()).await?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|source| GenaiError::Connect {
                url: display_url.clone(),
                source,
            })?;
        request.headers_mut().extend(headers);

        let request_id = loud_wire::next_request_id();
        loud_wire::log_ws_connect(request_id, &display_url);
        debug!(url = %display_url, "Opening Live session");

        let (ws_stream, _response) = ctx
            .run(async {
                connect_async(request)
                    .await
                    .map_err(|source| GenaiError::Connect {
                        url: display_url.clone(),
                        source,
                    })
            })
            .await?;
        let (sink, stream) = ws_stream.split();

        let session = Session {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            model: model.clone(),
            request_id,
        };

        let setup = LiveClientMessage {
            setup: Some(LiveClientSetup {
                model,
                generation_config: config.and_then(|c| c.generation_config.clone()),
                system_instruction: config.and_then(|c| c.system_instruction.clone()),
                tools: config.and_then(|c| c.tools.clone()),
            }),
            ..Default::default()
        };
        ctx.run(session.write(&setup)).await?;

        info!(model = %session.model, "Live session established");
        Ok(session)
    }

    /// `ws`/`wss` URL of the Live endpoint, keeping any base path as prefix.
    fn websocket_url(&self) -> Result<Url, GenaiError> {
        let base = parse_url(self.client.base_url())?;
        let endpoint = self.client.strategy().live_endpoint();

        let scheme = match base.scheme() {
            "ws" | "wss" => base.scheme().to_string(),
            _ => "wss".to_string(),
        };
        let host = base.host_str().unwrap_or_default();
        let port = base.port().map(|p| format!(":{p}")).unwrap_or_default();
        let mut raw = format!(
            "{scheme}://{host}{port}{}{}",
            base.path().trim_end_matches('/'),
            endpoint.path
        );
        if let Some(query) = endpoint.query {
            raw.push('?');
            raw.push_str(&query);
        }
        parse_url(&raw)
    }

    async fn handshake_headers(&self) -> Result<HeaderMap, GenaiError> {
        let strategy = self.client.strategy();
        let endpoint = strategy.live_endpoint();
        if !endpoint.bearer_auth {
            return Ok(self.client.http_options().headers.clone());
        }

        let source = self.client.token_source().ok_or_else(|| {
            GenaiError::Auth("a token source is required for Vertex AI Live sessions".to_string())
        })?;
        let token = source.token().await?;
        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| GenaiError::Auth(format!("token is not a valid header value: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

/// The URL without its query string, which may hold an API key.
fn display_url(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// An open Live session.
///
/// Dropping the session drops the socket without a close frame; prefer
/// [`close`](Self::close).
pub struct Session {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    model: String,
    request_id: usize,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model", &self.model)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// The fully qualified model this session was set up with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one message as a text frame.
    ///
    /// # Errors
    ///
    /// - [`GenaiError::InvalidInput`] when the message carries `setup`.
    /// - [`GenaiError::WebSocket`] when the frame cannot be written.
    pub async fn send(&self, message: &LiveClientMessage) -> Result<(), GenaiError> {
        if message.setup.is_some() {
            return Err(GenaiError::InvalidInput(
                "setup is sent by connect and cannot be sent again".to_string(),
            ));
        }
        self.write(message).await
    }

    async fn write(&self, message: &LiveClientMessage) -> Result<(), GenaiError> {
        let json = serde_json::to_string(message)?;
        loud_wire::log_ws_send(self.request_id, &json);
        self.sink.lock().await.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Waits for the next server message.
    ///
    /// Control frames are skipped. A frame that is not a valid server
    /// message yields [`GenaiError::MalformedMessage`] and the session stays
    /// usable.
    ///
    /// # Errors
    ///
    /// - [`GenaiError::SessionClosed`] once the server closes the socket.
    /// - [`GenaiError::MalformedMessage`] for an undecodable frame.
    /// - [`GenaiError::WebSocket`] for transport failures.
    pub async fn receive(&self) -> Result<LiveServerMessage, GenaiError> {
        let mut stream = self.stream.lock().await;
        loop {
            let frame = match stream.next().await {
                None => return Err(GenaiError::SessionClosed),
                Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                )) => return Err(GenaiError::SessionClosed),
                Some(Err(e)) => return Err(GenaiError::WebSocket(e)),
                Some(Ok(frame)) => frame,
            };

            let (message_type, data): (&'static str, &[u8]) = match &frame {
                Message::Text(text) => ("text", text.as_bytes()),
                Message::Binary(bytes) => ("binary", bytes.as_ref()),
                Message::Close(close) => {
                    debug!(?close, "Live session closed by server");
                    return Err(GenaiError::SessionClosed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            loud_wire::log_ws_receive(self.request_id, &String::from_utf8_lossy(data));
            return serde_json::from_slice(data).map_err(|source| {
                warn!(message_type, length = data.len(), "Undecodable Live message");
                GenaiError::MalformedMessage {
                    message_type,
                    length: data.len(),
                    source,
                }
            });
        }
    }

    /// Sends a close frame and releases the socket.
    ///
    /// # Errors
    ///
    /// [`GenaiError::WebSocket`] when the close frame cannot be sent.
    pub async fn close(self) -> Result<(), GenaiError> {
        debug!("Closing Live session");
        match self.sink.into_inner().close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(GenaiError::WebSocket(e)),
        }
    }
}
