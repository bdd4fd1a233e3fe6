//! The artifact record shared by every stage of a synchronization cycle.

use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::category::Category;
use super::dates::{from_epoch_millis, optional_date, optional_date_time};

#[allow(clippy::expect_used)]
static MODIFICATION_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"modificationDate=(\d+)").expect("modification date regex is valid")
});

/// Filename used when a URL has no usable last path segment.
const FALLBACK_FILENAME: &str = "file";

/// One downloadable file referenced by the catalog.
///
/// Identity is the URL alone: equality and hashing ignore every other field.
/// Field names on disk follow the registry format already in use, which mixes
/// camelCase transport fields with snake_case release fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub url: String,
    /// Raw filename as it appears in the URL (may be percent-encoded).
    pub filename: String,
    #[serde(rename = "contentLength", default)]
    pub content_length: u64,
    #[serde(rename = "contentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(
        rename = "lastModified",
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_date_time"
    )]
    pub last_modified: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_date")]
    pub effective_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_date")]
    pub publishing_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub is_latest_release: bool,
    #[serde(default)]
    pub downloaded: bool,
    #[serde(
        rename = "downloadTime",
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_date_time"
    )]
    pub download_time: Option<NaiveDateTime>,
    /// SHA-256 of the stored bytes, lower-case hex.
    #[serde(rename = "actual_hash", default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(rename = "actual_size", default)]
    pub actual_size: u64,
    #[serde(rename = "localPath", default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

impl ArtifactRecord {
    /// Creates a transient record for a discovered link.
    ///
    /// The filename is the last URL path segment without its query string and
    /// the category is detected from filename and URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let filename = filename_from_url(&url);
        let category = Category::detect(&filename, &url);
        Self {
            url,
            filename,
            content_length: 0,
            content_type: None,
            last_modified: None,
            etag: None,
            category,
            effective_date: None,
            publishing_date: None,
            version: None,
            is_latest_release: false,
            downloaded: false,
            download_time: None,
            content_hash: None,
            actual_size: 0,
            local_path: None,
        }
    }

    /// Filename with percent-escapes resolved (`%20` becomes a space).
    #[must_use]
    pub fn decoded_filename(&self) -> String {
        decode_filename(&self.filename)
    }

    /// Upper-cased file extension, empty when the name has none.
    #[must_use]
    pub fn file_type(&self) -> String {
        let name = self.decoded_filename();
        match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_uppercase(),
            _ => String::new(),
        }
    }

    /// Timestamp carried by the URL's `modificationDate=<epoch millis>` query
    /// parameter.
    ///
    /// This is the transport-side date used only as a sort fallback; it never
    /// becomes an effective or publishing date.
    #[must_use]
    pub fn modification_time(&self) -> Option<DateTime<Utc>> {
        let caps = MODIFICATION_DATE.captures(&self.url)?;
        let millis: i64 = caps[1].parse().ok()?;
        from_epoch_millis(millis)
    }

    /// Returns whether a version string is present and non-empty.
    #[must_use]
    pub fn has_version(&self) -> bool {
        self.version.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Re-derives the category from filename and URL.
    pub fn refresh_category(&mut self) {
        self.category = Category::detect(&self.filename, &self.url);
    }
}

impl PartialEq for ArtifactRecord {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for ArtifactRecord {}

impl Hash for ArtifactRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

/// Extracts the last path segment of a URL, without query string.
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Resolves percent-escapes and form-encoded spaces in a filename.
///
/// Malformed escapes leave the input unchanged.
#[must_use]
pub fn decode_filename(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), std::borrow::Cow::into_owned)
}
