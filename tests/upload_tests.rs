//! Chunked upload tests against a local mock server.

mod common;

use std::io::Write;

use common::*;
use genai_transport::{CallContext, FileState, GenaiError};
use mockito::Matcher;
use tempfile::NamedTempFile;

const UPLOAD_PATH: &str = "/upload/v1beta/files";

const FINAL_FILE_BODY: &str = r#"{
    "file": {
        "name": "files/abc123",
        "displayName": "notes.txt",
        "mimeType": "text/plain",
        "sizeBytes": "11",
        "createTime": "2025-01-15T10:30:00Z",
        "expirationTime": "2025-01-17T10:30:00Z",
        "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
        "state": "ACTIVE",
        "source": "UPLOADED"
    }
}"#;

fn session_url(server: &mockito::Server) -> String {
    format!("{}{UPLOAD_PATH}?upload_id=session-1&upload_protocol=resumable", server.url())
}

fn temp_file_with(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents).expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

#[tokio::test]
async fn test_single_chunk_upload_from_reader() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::UrlEncoded("upload_id".into(), "session-1".into()))
        .match_header("x-goog-upload-command", "upload, finalize")
        .match_header("x-goog-upload-offset", "0")
        .match_header("x-goog-api-key", TEST_API_KEY)
        .match_body(Matcher::Exact("hello world".to_string()))
        .with_header("x-goog-upload-status", "final")
        .with_body(FINAL_FILE_BODY)
        .expect(1)
        .create_async()
        .await;

    let client = gemini_client(&server.url());
    let mut reader = &b"hello world"[..];
    let file = client
        .upload_file(&mut reader, &session_url(&server), 11, None, &CallContext::new())
        .await
        .expect("upload should succeed");

    mock.assert_async().await;
    assert_eq!(file.name, "files/abc123");
    assert_eq!(file.display_name.as_deref(), Some("notes.txt"));
    assert_eq!(file.size_bytes_as_u64(), Some(11));
    assert_eq!(file.state, Some(FileState::Active));
    assert!(file.is_active());
}

#[tokio::test]
async fn test_upload_from_path_uses_file_size() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::Any)
        .match_header("content-length", "11")
        .match_body(Matcher::Exact("hello world".to_string()))
        .with_header("x-goog-upload-status", "final")
        .with_body(FINAL_FILE_BODY)
        .create_async()
        .await;

    let temp = temp_file_with(b"hello world");
    let client = gemini_client(&server.url());
    let file = client
        .upload_file_from_path(temp.path(), &session_url(&server), None, &CallContext::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(file.uri, "https://generativelanguage.googleapis.com/v1beta/files/abc123");
}

#[tokio::test]
async fn test_upload_larger_than_one_chunk() {
    const CHUNK: usize = 8 * 1024 * 1024;
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::Any)
        .match_header("x-goog-upload-command", "upload")
        .match_header("x-goog-upload-offset", "0")
        .match_header("content-length", CHUNK.to_string().as_str())
        .with_header("x-goog-upload-status", "active")
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::Any)
        .match_header("x-goog-upload-command", "upload, finalize")
        .match_header("x-goog-upload-offset", CHUNK.to_string().as_str())
        .match_body(Matcher::Exact("tail".to_string()))
        .with_header("x-goog-upload-status", "final")
        .with_body(FINAL_FILE_BODY)
        .expect(1)
        .create_async()
        .await;

    let mut contents = vec![b'x'; CHUNK];
    contents.extend_from_slice(b"tail");
    let temp = temp_file_with(&contents);

    let client = gemini_client(&server.url());
    let file = with_timeout(
        TEST_TIMEOUT,
        client.upload_file_from_path(temp.path(), &session_url(&server), None, &CallContext::new()),
    )
    .await
    .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(file.name, "files/abc123");
}

#[tokio::test]
async fn test_vertex_upload_carries_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", format!("Bearer {TEST_TOKEN}").as_str())
        .with_header("x-goog-upload-status", "final")
        .with_body(FINAL_FILE_BODY)
        .create_async()
        .await;

    let client = vertex_client(&server.url());
    let mut reader = &b"abc"[..];
    client
        .upload_file(&mut reader, &session_url(&server), 3, None, &CallContext::new())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_final_response_without_file_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::Any)
        .with_header("x-goog-upload-status", "final")
        .with_body("{}")
        .create_async()
        .await;

    let client = gemini_client(&server.url());
    let mut reader = &b"abc"[..];
    let err = client
        .upload_file(&mut reader, &session_url(&server), 3, None, &CallContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GenaiError::MalformedResponse(ref m) if m.contains("file")));
}

#[tokio::test]
async fn test_server_error_mid_upload() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body(r#"{"error":{"code":503,"message":"try later","status":"UNAVAILABLE"}}"#)
        .create_async()
        .await;

    let client = gemini_client(&server.url());
    let mut reader = &b"abc"[..];
    let err = client
        .upload_file(&mut reader, &session_url(&server), 3, None, &CallContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.as_api_error().map(|e| e.status.as_str()), Some("UNAVAILABLE"));
}

#[tokio::test]
async fn test_declared_size_larger_than_source() {
    let mut server = mockito::Server::new_async().await;
    let never = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = gemini_client(&server.url());
    let mut reader = &b"abc"[..];
    let err = client
        .upload_file(&mut reader, &session_url(&server), 5, None, &CallContext::new())
        .await
        .unwrap_err();

    never.assert_async().await;
    assert!(matches!(err, GenaiError::Upload(ref m) if m.contains("requested 5 bytes, read 3")));
}

#[tokio::test]
async fn test_empty_file_sends_single_finalize_chunk() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", UPLOAD_PATH)
        .match_query(Matcher::Any)
        .match_header("x-goog-upload-command", "upload, finalize")
        .match_header("x-goog-upload-offset", "0")
        .match_header("content-length", "0")
        .with_header("x-goog-upload-status", "final")
        .with_body(FINAL_FILE_BODY)
        .expect(1)
        .create_async()
        .await;

    let temp = temp_file_with(b"");
    let client = gemini_client(&server.url());
    let file = client
        .upload_file_from_path(temp.path(), &session_url(&server), None, &CallContext::new())
        .await
        .expect("empty upload should succeed");

    mock.assert_async().await;
    assert_eq!(file.name, "files/abc123");
}

#[tokio::test]
async fn test_missing_path_is_invalid_input() {
    let client = gemini_client("http://127.0.0.1:9/");
    let err = client
        .upload_file_from_path(
            "/definitely/not/here.bin",
            "http://127.0.0.1:9/upload",
            None,
            &CallContext::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GenaiError::InvalidInput(ref m) if m.contains("/definitely/not/here.bin")));
}

#[tokio::test]
async fn test_invalid_upload_url() {
    let client = gemini_client("http://127.0.0.1:9/");
    let mut reader = &b"abc"[..];
    let err = client
        .upload_file(&mut reader, "not a url", 3, None, &CallContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GenaiError::Url { ref url, .. } if url == "not a url"));
}
