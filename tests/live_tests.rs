//! Live session tests against a local WebSocket server.

mod common;

use std::sync::Arc;

use common::*;
use futures_util::{SinkExt, StreamExt};
use genai_transport::{
    Backend, CallContext, Client, GenaiError, HttpOptions, LiveClientMessage, LiveConnectConfig,
};
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// What the server saw during the handshake plus the first frame.
#[derive(Debug)]
struct Handshake {
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    setup: Value,
    /// The setup frame exactly as it arrived.
    setup_text: String,
}

struct LiveServer {
    base_url: String,
    handshake: oneshot::Receiver<Handshake>,
    /// Text frames the client sent after setup.
    frames: mpsc::UnboundedReceiver<Value>,
}

/// Accepts one session, reports the handshake and setup frame, writes
/// `replies`, then forwards client frames until the socket closes.
async fn spawn_live_server(replies: Vec<Message>) -> LiveServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (handshake_tx, handshake) = oneshot::channel();
    let (frames_tx, frames) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_in_callback = Arc::clone(&seen);
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            *seen_in_callback.lock().unwrap() = Some((
                req.uri().path().to_string(),
                req.uri().query().map(String::from),
                req.headers().clone(),
            ));
            Ok(resp)
        };
        let mut ws = accept_hdr_async(socket, callback).await.unwrap();

        let setup_text = match ws.next().await {
            Some(Ok(Message::Text(text))) => text.as_str().to_string(),
            other => panic!("expected a setup text frame, got {other:?}"),
        };
        let setup = serde_json::from_str(&setup_text).unwrap();
        let (path, query, headers) = seen.lock().unwrap().take().unwrap();
        let _ = handshake_tx.send(Handshake {
            path,
            query,
            headers,
            setup,
            setup_text,
        });

        for reply in replies {
            if ws.send(reply).await.is_err() {
                return;
            }
        }

        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => {
                    let _ = frames_tx.send(serde_json::from_str(text.as_str()).unwrap());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    LiveServer {
        base_url: format!("ws://{addr}/"),
        handshake,
        frames,
    }
}

fn text(json: Value) -> Message {
    Message::Text(json.to_string().into())
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test]
async fn test_gemini_connect_sends_key_and_setup() {
    let server = spawn_live_server(vec![]).await;
    let client = gemini_client(&server.base_url);

    let session = with_timeout(
        TEST_TIMEOUT,
        client
            .live()
            .connect("gemini-2.0-flash-live-001", None, &CallContext::new()),
    )
    .await
    .expect("connect should succeed");

    let handshake = with_timeout(TEST_TIMEOUT, server.handshake).await.unwrap();
    assert_eq!(
        handshake.path,
        "/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent"
    );
    assert_eq!(handshake.query.as_deref(), Some("key=test-api-key"));
    assert!(handshake.headers.get("authorization").is_none());
    assert_eq!(
        handshake.setup,
        json!({"setup": {"model": "models/gemini-2.0-flash-live-001"}})
    );
    assert_eq!(session.model(), "models/gemini-2.0-flash-live-001");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_gemini_connect_forwards_client_headers() {
    let server = spawn_live_server(vec![]).await;
    let client = Client::builder(Backend::GeminiApi)
        .api_key(TEST_API_KEY)
        .http_options(
            HttpOptions::new()
                .with_base_url(&server.base_url)
                .with_header("x-trace", "live")
                .unwrap(),
        )
        .build()
        .unwrap();

    let session = with_timeout(
        TEST_TIMEOUT,
        client.live().connect("gemini-2.0-flash-live-001", None, &CallContext::new()),
    )
    .await
    .unwrap();

    let handshake = server.handshake.await.unwrap();
    assert_eq!(handshake.headers["x-trace"], "live");
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_gemini_live_path_ignores_rest_api_version() {
    let server = spawn_live_server(vec![]).await;
    let client = Client::builder(Backend::GeminiApi)
        .api_key(TEST_API_KEY)
        .http_options(
            HttpOptions::new()
                .with_base_url(&server.base_url)
                .with_api_version("v1"),
        )
        .build()
        .unwrap();

    let session = with_timeout(
        TEST_TIMEOUT,
        client.live().connect("gemini-2.0-flash-live-001", None, &CallContext::new()),
    )
    .await
    .unwrap();

    let handshake = server.handshake.await.unwrap();
    assert_eq!(
        handshake.path,
        "/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent"
    );
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_vertex_connect_uses_bearer_and_full_model_name() {
    let server = spawn_live_server(vec![]).await;
    let client = vertex_client(&server.base_url);
    let config = LiveConnectConfig::new()
        .with_generation_config(json!({
            "responseModalities": ["AUDIO"],
            "temperature": 0.7,
            "topP": 0.95,
            "maxOutputTokens": 256
        }))
        .with_system_instruction(json!({"parts": [{"text": "Be brief."}]}))
        .with_tools(vec![json!({"googleSearch": {}})]);

    let session = with_timeout(
        TEST_TIMEOUT,
        client
            .live()
            .connect("gemini-2.0-flash-live-001", Some(&config), &CallContext::new()),
    )
    .await
    .unwrap();

    let handshake = server.handshake.await.unwrap();
    assert_eq!(
        handshake.path,
        "/ws/google.cloud.aiplatform.v1beta1.LlmBidiService/BidiGenerateContent"
    );
    assert!(handshake.query.is_none());
    assert_eq!(
        handshake.headers["authorization"],
        format!("Bearer {TEST_TOKEN}").as_str()
    );
    assert_eq!(handshake.headers["content-type"], "application/json");
    assert_eq!(
        handshake.setup,
        json!({
            "setup": {
                "model": "projects/test-project/locations/us-central1/publishers/google/models/gemini-2.0-flash-live-001",
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "temperature": 0.7,
                    "topP": 0.95,
                    "maxOutputTokens": 256
                },
                "systemInstruction": {"parts": [{"text": "Be brief."}]},
                "tools": [{"googleSearch": {}}]
            }
        })
    );
    // Numbers keep their exact wire form.
    for field in [r#""temperature":0.7"#, r#""topP":0.95"#, r#""maxOutputTokens":256"#] {
        assert!(
            handshake.setup_text.contains(field),
            "{field} missing from {}",
            handshake.setup_text
        );
    }

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_vertex_connect_requires_token_source() {
    let client = Client::builder(Backend::VertexAi)
        .project("test-project")
        .location("us-central1")
        .http_options(HttpOptions::new().with_base_url("ws://127.0.0.1:9/"))
        .build()
        .unwrap();

    let err = client
        .live()
        .connect("gemini-2.0-flash-live-001", None, &CallContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GenaiError::Auth(_)));
}

#[tokio::test]
async fn test_connect_rejects_empty_model() {
    let client = gemini_client("ws://127.0.0.1:9/");
    let err = client
        .live()
        .connect("", None, &CallContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GenaiError::InvalidInput(_)));
}

#[tokio::test]
async fn test_connect_failure_names_url_without_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = gemini_client(&format!("ws://{addr}/path/"));
    let err = with_timeout(
        TEST_TIMEOUT,
        client
            .live()
            .connect("gemini-2.0-flash-live-001", None, &CallContext::new()),
    )
    .await
    .unwrap_err();

    match err {
        GenaiError::Connect { url, .. } => {
            assert!(url.contains("/path/ws/"), "unexpected url {url}");
            assert!(!url.contains(TEST_API_KEY));
        }
        other => panic!("expected a connect error, got {other:?}"),
    }
}

// =============================================================================
// Session traffic
// =============================================================================

#[tokio::test]
async fn test_receive_sequence() {
    let server = spawn_live_server(vec![
        text(json!({"setupComplete": {}})),
        Message::Ping(vec![1, 2, 3].into()),
        text(json!({"serverContent": {"modelTurn": {"parts": [{"text": "Hi"}]}}})),
        Message::Text("not json".into()),
        Message::Binary(
            json!({"serverContent": {"turnComplete": true}})
                .to_string()
                .into_bytes()
                .into(),
        ),
        Message::Close(None),
    ])
    .await;
    let client = gemini_client(&server.base_url);
    let session = client
        .live()
        .connect("gemini-2.0-flash-live-001", None, &CallContext::new())
        .await
        .unwrap();

    let first = with_timeout(TEST_TIMEOUT, session.receive()).await.unwrap();
    assert!(first.is_setup_complete());

    let second = with_timeout(TEST_TIMEOUT, session.receive()).await.unwrap();
    assert!(!second.is_turn_complete());
    assert_eq!(
        second.server_content.as_ref().unwrap()["modelTurn"]["parts"][0]["text"],
        "Hi"
    );

    let err = with_timeout(TEST_TIMEOUT, session.receive())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenaiError::MalformedMessage {
            message_type: "text",
            length: 8,
            ..
        }
    ));

    let fourth = with_timeout(TEST_TIMEOUT, session.receive()).await.unwrap();
    assert!(fourth.is_turn_complete());

    let closed = with_timeout(TEST_TIMEOUT, session.receive())
        .await
        .unwrap_err();
    assert!(matches!(closed, GenaiError::SessionClosed));
}

#[tokio::test]
async fn test_send_writes_client_messages() {
    let mut server = spawn_live_server(vec![]).await;
    let client = gemini_client(&server.base_url);
    let session = client
        .live()
        .connect("gemini-2.0-flash-live-001", None, &CallContext::new())
        .await
        .unwrap();

    session
        .send(&LiveClientMessage::client_content(json!({
            "turns": [{"role": "user", "parts": [{"text": "Hello"}]}],
            "turnComplete": true
        })))
        .await
        .unwrap();
    session
        .send(&LiveClientMessage::tool_response(json!({
            "functionResponses": [{"id": "call-1", "name": "lookup", "response": {"ok": true}}]
        })))
        .await
        .unwrap();

    let first = with_timeout(TEST_TIMEOUT, server.frames.recv()).await.unwrap();
    assert_eq!(first["clientContent"]["turnComplete"], true);
    let second = with_timeout(TEST_TIMEOUT, server.frames.recv()).await.unwrap();
    assert_eq!(second["toolResponse"]["functionResponses"][0]["id"], "call-1");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_send_rejects_setup() {
    let server = spawn_live_server(vec![]).await;
    let client = gemini_client(&server.base_url);
    let session = client
        .live()
        .connect("gemini-2.0-flash-live-001", None, &CallContext::new())
        .await
        .unwrap();

    let message: LiveClientMessage = serde_json::from_value(json!({
        "setup": {"model": "models/other"}
    }))
    .unwrap();
    let err = session.send(&message).await.unwrap_err();
    assert!(matches!(err, GenaiError::InvalidInput(_)));

    session.close().await.unwrap();
}
