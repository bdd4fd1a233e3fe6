//! Rebuilding an empty registry from the cumulative download history.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::change::{file_sha256, storage_path};
use super::Registry;
use crate::artifact::decode_filename;
use crate::export::{DownloadStatus, read_history, record_from_row};

/// Outcome of [`seed_from_history`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Entries added to the registry.
    pub seeded: usize,
    /// Seeded entries whose file was found on disk.
    pub located: usize,
    /// Rows skipped because they record a failed transfer or have no URL.
    pub skipped: usize,
}

/// Populates an empty registry from `downloaded-files.csv`.
///
/// Does nothing when the registry already has entries or the history does
/// not exist. Read errors are logged and yield an empty summary. The caller
/// decides when to persist the result.
pub fn seed_from_history(registry: &mut Registry, history_csv: &Path, base: &Path) -> SeedSummary {
    let mut summary = SeedSummary::default();
    if !registry.is_empty() {
        return summary;
    }

    let (header, rows) = match read_history(history_csv) {
        Ok(Some((header, rows))) if !header.is_empty() => (header, rows),
        Ok(_) => {
            info!(path = %history_csv.display(), "no download history - skipping registry seeding");
            return summary;
        }
        Err(error) => {
            warn!(error = %error, "could not read download history - skipping registry seeding");
            return summary;
        }
    };

    info!(path = %history_csv.display(), rows = rows.len(), "seeding registry from download history");
    let status_column = header.iter().position(|column| column == "status");

    for row in &rows {
        let succeeded = status_column
            .and_then(|index| row.get(index))
            .is_none_or(|status| status.trim() == DownloadStatus::SUCCEEDED);
        let Some(mut record) = record_from_row(&header, row).filter(|_| succeeded) else {
            summary.skipped += 1;
            continue;
        };

        record.downloaded = true;
        if let Some(found) = locate(base, &storage_path(base, &record), &record.filename) {
            match file_sha256(&found) {
                Ok(hash) => record.content_hash = Some(hash),
                Err(error) => warn!(path = %found.display(), error = %error, "could not hash seeded file"),
            }
            if let Ok(meta) = std::fs::metadata(&found) {
                record.actual_size = meta.len();
            }
            record.local_path = Some(found);
            summary.located += 1;
        } else {
            debug!(filename = %record.decoded_filename(), "seeded entry has no local file");
        }

        registry.register(record);
        summary.seeded += 1;
    }

    info!(
        seeded = summary.seeded,
        located = summary.located,
        skipped = summary.skipped,
        "registry seeding complete"
    );
    summary
}

/// Finds the stored file: the default location first, then a walk of `base`
/// for the decoded or raw filename.
fn locate(base: &Path, preferred: &Path, raw_filename: &str) -> Option<PathBuf> {
    if preferred.is_file() {
        return Some(preferred.to_path_buf());
    }
    let decoded = decode_filename(raw_filename);
    find_file(base, &[decoded.as_str(), raw_filename])
}

fn find_file(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if entry
            .file_name()
            .to_str()
            .is_some_and(|name| names.contains(&name))
        {
            return Some(path);
        }
    }
    subdirs.sort();
    subdirs.iter().find_map(|sub| find_file(sub, names))
}
