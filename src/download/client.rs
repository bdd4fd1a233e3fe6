//! HTTP client wrapper for the catalog page, metadata probes and transfers.
//!
//! This module provides the `HttpClient` struct which owns one pooled
//! `reqwest::Client` configured with the run's timeouts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, LAST_MODIFIED};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, PARTIAL_SUFFIX, READ_TIMEOUT};
use super::error::DownloadError;
use crate::user_agent;

/// Transport metadata reported by a HEAD probe.
///
/// Every field is optional on the wire; a missing or unparseable
/// `Content-Length` is reported as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<NaiveDateTime>,
    pub etag: Option<String>,
}

/// Outcome of a completed full fetch.
///
/// Size and hash are computed from the same byte stream that was written to
/// `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub size: u64,
    /// SHA-256 of the stored bytes, lower-case hex.
    pub sha256: String,
}

/// HTTP client for catalog, probe and transfer requests.
///
/// This client is designed to be created once per cycle and reused,
/// taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default 30 s connect / 60 s read timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the TLS backend cannot be set up.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(CONNECT_TIMEOUT, READ_TIMEOUT)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the TLS backend cannot be set up.
    #[instrument(level = "debug")]
    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, DownloadError> {
        let client = build_client(connect_timeout, read_timeout).map_err(DownloadError::client)?;
        Ok(Self { client })
    }

    /// Fetches the catalog document as text.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` on an invalid URL, network failure, timeout or
    /// non-success status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_document(&self, url: &str) -> Result<String, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = self.send_request(self.client.get(url), url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(url, e))?;
        info!(bytes = body.len(), "catalog document fetched");
        Ok(body)
    }

    /// Issues a HEAD request and collects the transport metadata.
    ///
    /// Only status 200 counts as success; redirects are followed first.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` on an invalid URL, network failure, timeout or
    /// any status other than 200.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &str) -> Result<ProbeResult, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let response = self.send_request(self.client.head(url), url).await?;
        if response.status().as_u16() != 200 {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        let probe = probe_from_headers(response.headers());
        debug!(
            content_length = probe.content_length,
            etag = ?probe.etag,
            last_modified = ?probe.last_modified,
            "probe complete"
        );
        Ok(probe)
    }

    /// Streams the body of `url` to `destination`, hashing it on the way.
    ///
    /// Bytes go to a sibling `.part` file which is renamed over `destination`
    /// only after the stream completed, so an earlier copy survives a failed
    /// transfer. Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` on an invalid URL, network failure, timeout,
    /// non-success status or any file system error. The partial file is removed.
    #[must_use = "fetch result carries the size and hash of the stored file"]
    #[instrument(skip(self, destination), fields(url = %url, path = %destination.display()))]
    pub async fn fetch_to_path(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<FetchedFile, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let response = self.send_request(self.client.get(url), url).await?;

        let partial = partial_path(destination);
        let mut file = File::create(&partial)
            .await
            .map_err(|e| DownloadError::io(partial.clone(), e))?;

        let stream_result = stream_to_file(&mut file, response, url, &partial).await;
        drop(file);
        let (size, sha256) = match stream_result {
            Ok(outcome) => outcome,
            Err(error) => {
                debug!(path = %partial.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(error);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, destination).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DownloadError::io(destination, e));
        }

        info!(bytes = size, "artifact stored");
        Ok(FetchedFile {
            path: destination.to_path_buf(),
            size,
            sha256,
        })
    }

    async fn send_request(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, DownloadError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(url, e))?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }
}

fn classify_transport_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

/// Streams a response body to file, returning bytes written and their hash.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<(u64, String), DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| classify_transport_error(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;
        hasher.update(&chunk);

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;
    writer
        .get_mut()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok((bytes_written, format!("{:x}", hasher.finalize())))
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

fn header_text(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads probe metadata from response headers.
#[must_use]
pub fn probe_from_headers(headers: &HeaderMap) -> ProbeResult {
    ProbeResult {
        content_length: header_text(headers, CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        content_type: header_text(headers, CONTENT_TYPE),
        last_modified: header_text(headers, LAST_MODIFIED).and_then(|v| parse_last_modified(&v)),
        etag: header_text(headers, ETAG),
    }
}

/// Parses an RFC 7231 HTTP-date into a UTC wall-clock timestamp.
#[must_use]
pub fn parse_last_modified(value: &str) -> Option<NaiveDateTime> {
    let system_time = httpdate::parse_http_date(value.trim()).ok()?;
    Some(DateTime::<Utc>::from(system_time).naive_utc())
}

fn build_client(connect_timeout: Duration, read_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use reqwest::header::HeaderValue;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_parse_last_modified_http_date() {
        let parsed = parse_last_modified("Thu, 23 Oct 2025 13:29:29 GMT").unwrap();
        assert_eq!(parsed.to_string(), "2025-10-23 13:29:29");
        assert_eq!(parse_last_modified("yesterday"), None);
    }

    #[test]
    fn test_probe_from_headers_reads_all_fields() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("150"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        );
        headers.insert(ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Thu, 23 Oct 2025 13:29:29 GMT"),
        );
        let probe = probe_from_headers(&headers);
        assert_eq!(probe.content_length, 150);
        assert_eq!(probe.etag.as_deref(), Some("\"abc\""));
        assert!(probe.last_modified.is_some());
    }

    #[test]
    fn test_probe_from_headers_missing_fields() {
        let probe = probe_from_headers(&HeaderMap::new());
        assert_eq!(probe, ProbeResult::default());
    }

    #[test]
    fn test_fetch_to_path_invalid_url_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("eas.xlsx");
        let client = HttpClient::new().unwrap();
        let result = tokio_test::block_on(client.fetch_to_path("not-a-valid-url", &destination));
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
        assert!(!destination.exists());
    }

    #[test]
    fn test_partial_path_is_sibling() {
        let partial = partial_path(Path::new("/data/EAS code list/eas.xlsx"));
        assert_eq!(partial, PathBuf::from("/data/EAS code list/eas.xlsx.part"));
    }

    #[tokio::test]
    async fn test_fetch_to_path_stores_and_hashes() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/download/attachments/1/eas.xlsx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("EAS code list").join("eas.xlsx");
        let client = HttpClient::new().unwrap();
        let fetched = client
            .fetch_to_path(
                &format!("{}/download/attachments/1/eas.xlsx", server.uri()),
                &destination,
            )
            .await
            .unwrap();

        assert_eq!(fetched.size, 5);
        assert_eq!(
            fetched.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(std::fs::read(&destination).unwrap(), b"hello");
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn test_fetch_to_path_keeps_previous_copy_on_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("eas.xlsx");
        std::fs::write(&destination, b"old").unwrap();

        let client = HttpClient::new().unwrap();
        let result = client
            .fetch_to_path(&format!("{}/eas.xlsx", server.uri()), &destination)
            .await;

        assert!(matches!(result, Err(DownloadError::HttpStatus { status: 500, .. })));
        assert_eq!(std::fs::read(&destination).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_probe_rejects_non_200_success() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let result = client.probe(&format!("{}/a.zip", server.uri())).await;
        assert!(matches!(result, Err(DownloadError::HttpStatus { status: 204, .. })));
    }

    #[tokio::test]
    async fn test_probe_reads_headers() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("HEAD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v2\"")
                    .insert_header("Last-Modified", "Thu, 23 Oct 2025 13:29:29 GMT"),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let probe = client.probe(&format!("{}/a.zip", server.uri())).await.unwrap();
        assert_eq!(probe.etag.as_deref(), Some("\"v2\""));
        assert!(probe.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_fetch_document_returns_body() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let body = client
            .fetch_document(&format!("{}/catalog", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html></html>");
    }
}
