//! NEW / CHANGED / UNCHANGED classification of freshly probed artifacts.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactRecord;

/// Outcome of comparing a fresh record with its registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    New,
    Changed,
    Unchanged,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Changed => "CHANGED",
            Self::Unchanged => "UNCHANGED",
        }
    }

    /// Returns whether the artifact must be fetched.
    #[must_use]
    pub fn needs_transfer(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification plus the human-readable reasons behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeAssessment {
    pub kind: ChangeKind,
    pub reasons: Vec<String>,
    /// Where the artifact is (or will be) stored.
    pub local_path: PathBuf,
}

impl ChangeAssessment {
    #[must_use]
    pub fn reason_text(&self) -> String {
        self.reasons.join(", ")
    }
}

/// Stand-in name for an artifact whose remote name has no usable final segment.
const UNNAMED_ARTIFACT: &str = "artifact";

/// Final path segment of `name` when it can serve as one file or directory
/// name: separators of either style split it, and empty, `.` and `..`
/// segments are rejected.
#[must_use]
pub fn safe_component(name: &str) -> Option<&str> {
    let last = name.rsplit(['/', '\\']).next()?;
    match last.trim() {
        "" | "." | ".." => None,
        _ => Some(last),
    }
}

/// Default storage location: `<base>/<category>/<decoded filename>`.
///
/// Records without a category are stored directly under `base`. Both the
/// category label and the filename are reduced to a single segment, so the
/// result never leaves `base`.
#[must_use]
pub fn storage_path(base: &Path, record: &ArtifactRecord) -> PathBuf {
    let dir = match safe_component(record.category.as_str()) {
        Some(category) => base.join(category),
        None => base.to_path_buf(),
    };
    let decoded = record.decoded_filename();
    dir.join(safe_component(&decoded).unwrap_or(UNNAMED_ARTIFACT))
}

/// Where a stored artifact is expected on disk: its recorded path when it has
/// one, else [`storage_path`].
#[must_use]
pub fn expected_path(base: &Path, stored: &ArtifactRecord) -> PathBuf {
    stored
        .local_path
        .clone()
        .unwrap_or_else(|| storage_path(base, stored))
}

/// SHA-256 of a file on disk, lower-case hex.
///
/// # Errors
///
/// Returns any IO error raised while opening or reading the file.
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Header-level differences between a fresh probe and the stored record.
///
/// Sizes count only when both are non-zero, entity tags only when both are
/// present, and a modification time only when the fresh one is strictly later.
#[must_use]
pub fn header_changes(fresh: &ArtifactRecord, stored: &ArtifactRecord) -> Vec<String> {
    let mut reasons = Vec::new();

    if fresh.content_length > 0
        && stored.content_length > 0
        && fresh.content_length != stored.content_length
    {
        reasons.push(format!(
            "size changed ({} -> {})",
            stored.content_length, fresh.content_length
        ));
    }

    if let (Some(fresh_etag), Some(stored_etag)) = (&fresh.etag, &stored.etag) {
        if fresh_etag != stored_etag {
            reasons.push("etag changed".to_string());
        }
    }

    if let (Some(fresh_time), Some(stored_time)) = (fresh.last_modified, stored.last_modified) {
        if fresh_time > stored_time {
            reasons.push(format!("last modified changed ({stored_time} -> {fresh_time})"));
        }
    }

    reasons
}

/// Classifies a freshly probed record against its registry entry.
///
/// When `verify_hash` is set, an otherwise unchanged artifact whose on-disk
/// SHA-256 differs from the stored hash is reported as CHANGED.
#[must_use]
pub fn assess(
    fresh: &ArtifactRecord,
    stored: Option<&ArtifactRecord>,
    base: &Path,
    verify_hash: bool,
) -> ChangeAssessment {
    let Some(stored) = stored else {
        return new_artifact(fresh, base, "not in registry");
    };
    if !stored.downloaded {
        return new_artifact(fresh, base, "never downloaded");
    }

    let local_path = expected_path(base, stored);
    if !local_path.is_file() {
        let reason = format!("missing locally ({})", local_path.display());
        return new_artifact(fresh, base, &reason);
    }

    let mut reasons = header_changes(fresh, stored);
    if reasons.is_empty() && verify_hash {
        if let Some(reason) = hash_mismatch(&local_path, stored) {
            reasons.push(reason);
        }
    }

    let kind = if reasons.is_empty() {
        ChangeKind::Unchanged
    } else {
        info!(
            filename = %fresh.decoded_filename(),
            reasons = %reasons.join(", "),
            "artifact changed"
        );
        ChangeKind::Changed
    };

    ChangeAssessment {
        kind,
        reasons,
        local_path,
    }
}

fn new_artifact(fresh: &ArtifactRecord, base: &Path, reason: &str) -> ChangeAssessment {
    debug!(filename = %fresh.decoded_filename(), reason, "artifact is new");
    ChangeAssessment {
        kind: ChangeKind::New,
        reasons: vec![reason.to_string()],
        local_path: storage_path(base, fresh),
    }
}

fn hash_mismatch(path: &Path, stored: &ArtifactRecord) -> Option<String> {
    let expected = stored.content_hash.as_deref()?;
    match file_sha256(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected) => None,
        Ok(_) => Some("content hash mismatch".to_string()),
        Err(error) => {
            warn!(path = %path.display(), error = %error, "could not hash stored artifact");
            None
        }
    }
}
