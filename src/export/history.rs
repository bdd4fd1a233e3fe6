//! Cumulative download history (`downloaded-files.csv`).

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use super::csv::{parse_rows, to_csv_string};
use super::tables::{DATE_FORMAT, DOWNLOAD_HEADERS, LAST_MODIFIED_FORMAT};
use super::{ExportError, write_file};
use crate::artifact::{ArtifactRecord, Category};
use crate::registry::ordering;

/// Reads the history file as a header row plus data rows.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`ExportError::Io`] when the file exists but cannot be read.
pub fn read_history(path: &Path) -> Result<Option<(Vec<String>, Vec<Vec<String>>)>, ExportError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(ExportError::io(path, error)),
    };
    let mut rows = parse_rows(&text);
    if rows.is_empty() {
        return Ok(Some((Vec::new(), Vec::new())));
    }
    let header = rows.remove(0);
    Ok(Some((header, rows)))
}

/// Appends download rows to the history and re-sorts the whole file.
///
/// # Errors
///
/// Returns [`ExportError::HeaderMismatch`] when an existing file has a
/// different header (the file is left untouched), or [`ExportError::Io`].
pub fn append_history(path: &Path, new_rows: &[Vec<String>]) -> Result<usize, ExportError> {
    let mut rows = match read_history(path)? {
        Some((header, rows)) if !header.is_empty() => {
            if header != DOWNLOAD_HEADERS {
                return Err(ExportError::HeaderMismatch {
                    path: path.to_path_buf(),
                    expected: DOWNLOAD_HEADERS.iter().map(ToString::to_string).collect(),
                    found: header,
                });
            }
            rows
        }
        _ => Vec::new(),
    };
    rows.extend(new_rows.iter().cloned());
    sort_rows(&mut rows);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    write_file(path, &to_csv_string(DOWNLOAD_HEADERS, &rows))?;
    info!(path = %path.display(), appended = new_rows.len(), total = rows.len(), "download history updated");
    Ok(rows.len())
}

/// Orders rows the same way records are ordered.
fn sort_rows(rows: &mut Vec<Vec<String>>) {
    let header: Vec<String> = DOWNLOAD_HEADERS.iter().map(ToString::to_string).collect();
    let mut keyed: Vec<(Option<ArtifactRecord>, Vec<String>)> = rows
        .drain(..)
        .map(|row| (record_from_row(&header, &row), row))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => ordering::compare(a, b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    rows.extend(keyed.into_iter().map(|(_, row)| row));
}

/// Rebuilds an artifact record from an export row.
///
/// Columns are looked up by name so older layouts still load. Unparseable
/// cells are left empty. Returns `None` when the row has no URL.
#[must_use]
pub fn record_from_row(header: &[String], row: &[String]) -> Option<ArtifactRecord> {
    let cell = |name: &str| -> Option<&str> {
        header
            .iter()
            .position(|column| column == name)
            .and_then(|index| row.get(index))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let url = cell("url")?;
    let mut record = ArtifactRecord::new(url);
    if let Some(filename) = cell("filename") {
        record.filename = filename.to_string();
    }
    record.category = cell("category").map_or_else(
        || Category::detect(&record.filename, &record.url),
        Category::from_label,
    );
    record.effective_date = cell("effective_date").and_then(parse_date);
    record.publishing_date = cell("publishing_date").and_then(parse_date);
    record.version = cell("version").map(str::to_string);
    record.is_latest_release = cell("is_latest_release").is_some_and(|v| v.eq_ignore_ascii_case("true"));
    record.content_length = cell("content_length").and_then(|v| v.parse().ok()).unwrap_or(0);
    record.content_type = cell("content_type").map(str::to_string);
    record.last_modified = cell("last_modified")
        .and_then(|v| NaiveDateTime::parse_from_str(v, LAST_MODIFIED_FORMAT).ok());
    record.actual_size = cell("actual_length").and_then(|v| v.parse().ok()).unwrap_or(0);
    record.content_hash = cell("hash").map(str::to_string);
    Some(record)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::export::{DownloadStatus, download_row};
    use tempfile::TempDir;

    fn row(name: &str, effective: Option<(i32, u32, u32)>) -> Vec<String> {
        let mut record =
            ArtifactRecord::new(format!("https://ec.europa.eu/download/attachments/1/{name}"));
        record.effective_date = effective.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        download_row(&record, &DownloadStatus::Succeeded)
    }

    #[test]
    fn test_history_append_creates_and_resorts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("downloaded-files.csv");

        append_history(&path, &[row("later.xlsx", Some((2024, 1, 1)))]).unwrap();
        let total = append_history(&path, &[row("earlier.xlsx", Some((2020, 1, 1)))]).unwrap();
        assert_eq!(total, 2);

        let (header, rows) = read_history(&path).unwrap().unwrap();
        assert_eq!(header, DOWNLOAD_HEADERS);
        assert_eq!(rows[0][7], "earlier.xlsx");
        assert_eq!(rows[1][7], "later.xlsx");
    }

    #[test]
    fn test_history_header_mismatch_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("downloaded-files.csv");
        std::fs::write(&path, "\"url\",\"filename\"\n\"https://x/a.zip\",\"a.zip\"\n").unwrap();

        let result = append_history(&path, &[row("a.xlsx", None)]);
        assert!(matches!(result, Err(ExportError::HeaderMismatch { .. })));
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("\"url\""));
    }

    #[test]
    fn test_history_record_from_row_by_column_name() {
        let header: Vec<String> = ["url", "filename", "effective_date", "hash", "category"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let values: Vec<String> = [
            "https://ec.europa.eu/download/attachments/1/eas-codes.xlsx",
            "eas-codes.xlsx",
            "15.11.2025",
            "abc",
            "EAS code list",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        let record = record_from_row(&header, &values).unwrap();
        assert_eq!(record.effective_date, NaiveDate::from_ymd_opt(2025, 11, 15));
        assert_eq!(record.content_hash.as_deref(), Some("abc"));
        assert_eq!(record.category, Category::Eas);
        assert!(record_from_row(&header, &[]).is_none());
    }
}
