//! Tabular exports of a synchronization cycle.
//!
//! - inventory: every analysed artifact (`inventory/registry-files-<ts>.csv`)
//! - changes: the transfer subset with its change kind (`changes/changes-<ts>.csv`)
//! - downloads: transfer outcomes (`downloads/downloads-<ts>.csv`)
//! - cumulative history of every download row (`downloaded-files.csv`)
//!
//! Rows are always written in [`ordering::compare`] order.
//!
//! [`ordering::compare`]: crate::registry::ordering::compare

pub mod csv;
mod history;
mod tables;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info};

use crate::artifact::ArtifactRecord;
use crate::registry::ChangeAssessment;
use crate::registry::ordering;

pub use history::{append_history, read_history, record_from_row};
pub use tables::{
    CHANGE_HEADERS, DOWNLOAD_HEADERS, DownloadStatus, INVENTORY_HEADERS, change_row, download_row,
    inventory_row,
};

/// Timestamp format embedded in export file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Errors raised while writing exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error writing export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("existing CSV {path} has header {found:?}, expected {expected:?}")]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// One completed or failed transfer, ready for export.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub record: ArtifactRecord,
    pub status: DownloadStatus,
}

/// Writes the per-cycle export files under one base directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    base: PathBuf,
    write_latest: bool,
    timestamp: String,
}

impl ReportWriter {
    /// Creates a writer whose file names carry the given cycle start time.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>, write_latest: bool, started: DateTime<Local>) -> Self {
        Self {
            base: base.into(),
            write_latest,
            timestamp: started.format(FILE_TIMESTAMP_FORMAT).to_string(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Writes the inventory of every analysed artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] when a file cannot be written.
    pub fn write_inventory(&self, records: &[ArtifactRecord]) -> Result<PathBuf, ExportError> {
        let mut sorted: Vec<&ArtifactRecord> = records.iter().collect();
        sorted.sort_by(|a, b| ordering::compare(a, b));
        let rows: Vec<Vec<String>> = sorted.into_iter().map(inventory_row).collect();
        self.write_table(
            "inventory",
            "registry-files",
            INVENTORY_HEADERS,
            &rows,
            self.write_latest,
        )
    }

    /// Writes the transfer subset with its change classification.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] when a file cannot be written.
    pub fn write_changes(
        &self,
        entries: &[(ArtifactRecord, ChangeAssessment)],
    ) -> Result<PathBuf, ExportError> {
        let mut sorted: Vec<&(ArtifactRecord, ChangeAssessment)> = entries.iter().collect();
        sorted.sort_by(|a, b| ordering::compare(&a.0, &b.0));
        let rows: Vec<Vec<String>> = sorted
            .into_iter()
            .map(|(record, assessment)| change_row(record, assessment))
            .collect();
        self.write_table("changes", "changes", CHANGE_HEADERS, &rows, self.write_latest)
    }

    /// Writes the transfer outcomes; the `-latest` copy is always refreshed.
    ///
    /// Returns the rows as written so they can be appended to the history.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] when a file cannot be written.
    pub fn write_downloads(
        &self,
        outcomes: &[DownloadOutcome],
    ) -> Result<Vec<Vec<String>>, ExportError> {
        let mut sorted: Vec<&DownloadOutcome> = outcomes.iter().collect();
        sorted.sort_by(|a, b| ordering::compare(&a.record, &b.record));
        let rows: Vec<Vec<String>> = sorted
            .into_iter()
            .map(|outcome| download_row(&outcome.record, &outcome.status))
            .collect();
        self.write_table("downloads", "downloads", DOWNLOAD_HEADERS, &rows, true)?;
        Ok(rows)
    }

    fn write_table(
        &self,
        subdir: &str,
        stem: &str,
        headers: &[&str],
        rows: &[Vec<String>],
        write_latest: bool,
    ) -> Result<PathBuf, ExportError> {
        let dir = self.base.join(subdir);
        std::fs::create_dir_all(&dir).map_err(|e| ExportError::io(&dir, e))?;

        let content = csv::to_csv_string(headers, rows);
        let path = dir.join(format!("{stem}-{}.csv", self.timestamp));
        write_file(&path, &content)?;
        if write_latest {
            let latest = dir.join(format!("{stem}-latest.csv"));
            write_file(&latest, &content)?;
            debug!(path = %latest.display(), "latest copy written");
        }

        info!(path = %path.display(), rows = rows.len(), "export written");
        Ok(path)
    }
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), ExportError> {
    std::fs::write(path, content.as_bytes()).map_err(|e| ExportError::io(path, e))
}
