//! Integration tests for the download module.
//!
//! These tests verify transfers, probes and pacing against mock HTTP servers.

use std::time::{Duration, Instant};

use codelist_sync_core::download::{DownloadError, HttpClient, RateLimiter};
use codelist_sync_core::registry::file_sha256;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Helper to mount a file endpoint.
async fn mount_file(server: &MockServer, path_str: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_download_full_flow_preserves_content_and_hash() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let content = b"EAS code list\nline 2\nline 3";
    mount_file(&server, "/download/attachments/1/eas.xlsx", content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let destination = temp_dir.path().join("EAS code list").join("eas.xlsx");

    let client = HttpClient::new().expect("client builds");
    let fetched = client
        .fetch_to_path(
            &format!("{}/download/attachments/1/eas.xlsx", server.uri()),
            &destination,
        )
        .await
        .expect("download should succeed");

    assert_eq!(fetched.path, destination);
    assert_eq!(fetched.size, content.len() as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), content);
    assert_eq!(
        fetched.sha256,
        file_sha256(&destination).unwrap(),
        "hash of the stream must match the stored bytes"
    );
}

#[tokio::test]
async fn test_download_replaces_previous_copy() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_file(&server, "/a.zip", b"new bytes").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let destination = temp_dir.path().join("a.zip");
    std::fs::write(&destination, b"old").unwrap();

    let client = HttpClient::new().expect("client builds");
    client
        .fetch_to_path(&format!("{}/a.zip", server.uri()), &destination)
        .await
        .expect("download should succeed");

    assert_eq!(std::fs::read(&destination).unwrap(), b"new bytes");
}

#[tokio::test]
async fn test_download_handles_404_without_creating_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let destination = temp_dir.path().join("missing.pdf");

    let client = HttpClient::new().expect("client builds");
    let result = client
        .fetch_to_path(&format!("{}/missing.pdf", server.uri()), &destination)
        .await;

    match result {
        Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected HttpStatus 404, got {other:?}"),
    }
    assert!(!destination.exists());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_download_document_rejects_invalid_url() {
    let client = HttpClient::new().expect("client builds");
    let result = client.fetch_document("definitely-not-a-url").await;
    assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_download_timeout_is_classified() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = HttpClient::with_timeouts(Duration::from_secs(1), Duration::from_millis(200))
        .expect("client builds");
    let result = client.fetch_document(&format!("{}/slow", server.uri())).await;
    assert!(matches!(result, Err(DownloadError::Timeout { .. })));
}

#[tokio::test]
async fn test_download_client_is_reusable_with_pacing() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_file(&server, "/one.csv", b"1").await;
    mount_file(&server, "/two.csv", b"2").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let client = HttpClient::new().expect("client builds");
    let limiter = RateLimiter::new(Duration::from_millis(200));

    let started = Instant::now();
    for name in ["one.csv", "two.csv"] {
        let url = format!("{}/{name}", server.uri());
        limiter.acquire(&url).await;
        client
            .fetch_to_path(&url, &temp_dir.path().join(name))
            .await
            .expect("download should succeed");
        limiter.record_completion(&url);
    }

    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(temp_dir.path().join("one.csv").exists());
    assert!(temp_dir.path().join("two.csv").exists());
}
