//! Tests for downloads: to memory, to disk, as a stream, and quick download

use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{MockHost, connect};

async fn storage_serving(object: &str, body: &'static [u8]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(object))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;
    server
}

async fn hand_out_url(host: &mut MockHost, file_uuid: &str, url: &str) {
    let call = host
        .answer_graphql(json!({"data": {"requestDownloadURL": url}}))
        .await;
    assert!(call.query.contains("requestDownloadURL(file: $file)"));
    assert_eq!(call.variables, json!({"file": {"euuid": file_uuid}}));
}

#[tokio::test]
async fn test_download_to_memory() {
    let server = storage_serving("/bucket/f1", b"file body").await;
    let url = format!("{}/bucket/f1", server.uri());

    let (eywa, mut host) = connect();
    let task = tokio::spawn(async move { eywa.download("f1", None).await });
    hand_out_url(&mut host, "f1", &url).await;

    assert_eq!(task.await.unwrap().unwrap(), Bytes::from_static(b"file body"));
}

#[tokio::test]
async fn test_download_http_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("NoSuchKey"))
        .mount(&server)
        .await;
    let url = format!("{}/bucket/gone", server.uri());

    let (eywa, mut host) = connect();
    let task = tokio::spawn(async move { eywa.download("gone", None).await });
    hand_out_url(&mut host, "gone", &url).await;

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Download failed: NoSuchKey");
    assert_eq!(err.code, Some(404));
}

#[tokio::test]
async fn test_download_http_error_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let url = format!("{}/bucket/x", server.uri());

    let (eywa, mut host) = connect();
    let task = tokio::spawn(async move { eywa.download("x", None).await });
    hand_out_url(&mut host, "x", &url).await;

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Download failed: HTTP 500");
}

#[tokio::test]
async fn test_download_url_errors() {
    let (eywa, mut host) = connect();
    let task = tokio::spawn(async move { eywa.download("x", None).await });
    host.answer_graphql(json!({"errors": [{"message": "File not found"}]}))
        .await;

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Failed to get download URL: File not found");
    assert_eq!(err.code, None);
}

#[tokio::test]
async fn test_download_missing_url() {
    let (eywa, mut host) = connect();
    let task = tokio::spawn(async move { eywa.download("x", None).await });
    host.answer_graphql(json!({"data": {}})).await;

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "No download URL in response");
}

#[tokio::test]
async fn test_download_to_creates_parent_dirs() {
    let server = storage_serving("/bucket/f2", b"nested").await;
    let url = format!("{}/bucket/f2", server.uri());
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("a").join("b").join("out.txt");

    let (eywa, mut host) = connect();
    let dest = target.clone();
    let task = tokio::spawn(async move { eywa.download_to("f2", &dest, None).await });
    hand_out_url(&mut host, "f2", &url).await;

    let saved = task.await.unwrap().unwrap();
    assert_eq!(saved, target);
    assert_eq!(std::fs::read(&target).unwrap(), b"nested");
}

#[tokio::test]
async fn test_download_stream_chunks_content() {
    static BODY: [u8; 20_000] = [7u8; 20_000];
    let server = storage_serving("/bucket/big", &BODY).await;
    let url = format!("{}/bucket/big", server.uri());

    let (eywa, mut host) = connect();
    let task = tokio::spawn(async move { eywa.download_stream("big").await });
    hand_out_url(&mut host, "big", &url).await;

    let stream = task.await.unwrap().unwrap();
    assert_eq!(stream.content_length(), 20_000);
    let chunks: Vec<Bytes> = stream.collect().await;
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks.iter().map(Bytes::len).sum::<usize>(), 20_000);
}

#[tokio::test]
async fn test_quick_download_uses_stored_name() {
    let server = storage_serving("/bucket/f3", b"q").await;
    let url = format!("{}/bucket/f3", server.uri());
    let dir = tempfile::tempdir().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let (eywa, mut host) = connect();
    let task = tokio::spawn(async move { eywa.quick_download("f3", None).await });

    let info = host
        .answer_graphql(json!({"data": {"getFile": {"euuid": "f3", "name": "stored.txt"}}}))
        .await;
    assert!(info.query.contains("getFile(euuid: $uuid)"));
    hand_out_url(&mut host, "f3", &url).await;

    let saved = task.await.unwrap().unwrap();
    let content = std::fs::read(dir.path().join("stored.txt"));
    std::env::set_current_dir(previous).unwrap();

    assert_eq!(saved, std::path::PathBuf::from("stored.txt"));
    assert_eq!(content.unwrap(), b"q");
}
