//! Column layouts and row builders for the exports.

use std::fmt;

use crate::artifact::ArtifactRecord;
use crate::registry::ChangeAssessment;

/// Date format of `effective_date` / `publishing_date` cells.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Format of `modification_date` cells (UTC).
pub const MODIFICATION_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format of `last_modified` cells.
pub const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const INVENTORY_HEADERS: &[&str] = &[
    "effective_date",
    "publishing_date",
    "version",
    "category",
    "is_latest_release",
    "modification_date",
    "url",
    "filename",
    "filetype",
    "content_length",
    "content_type",
    "last_modified",
];

pub const CHANGE_HEADERS: &[&str] = &[
    "effective_date",
    "publishing_date",
    "version",
    "category",
    "is_latest_release",
    "modification_date",
    "url",
    "filename",
    "filetype",
    "content_length",
    "content_type",
    "last_modified",
    "change",
];

pub const DOWNLOAD_HEADERS: &[&str] = &[
    "effective_date",
    "publishing_date",
    "version",
    "category",
    "is_latest_release",
    "modification_date",
    "url",
    "filename",
    "filetype",
    "content_length",
    "content_type",
    "last_modified",
    "actual_length",
    "hash",
    "status",
];

/// Result of one scheduled transfer, as shown in the `status` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Succeeded,
    Failed(String),
}

impl DownloadStatus {
    pub const SUCCEEDED: &'static str = "SUCCEEDED";

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str(Self::SUCCEEDED),
            Self::Failed(reason) => write!(f, "FAILED: {reason}"),
        }
    }
}

/// Inventory columns for one record.
#[must_use]
pub fn inventory_row(record: &ArtifactRecord) -> Vec<String> {
    vec![
        format_date(record.effective_date),
        format_date(record.publishing_date),
        record.version.clone().unwrap_or_default(),
        record.category.as_str().to_string(),
        record.is_latest_release.to_string(),
        record
            .modification_time()
            .map(|time| time.format(MODIFICATION_FORMAT).to_string())
            .unwrap_or_default(),
        record.url.clone(),
        record.filename.clone(),
        record.file_type(),
        record.content_length.to_string(),
        record.content_type.clone().unwrap_or_default(),
        record
            .last_modified
            .map(|time| time.format(LAST_MODIFIED_FORMAT).to_string())
            .unwrap_or_default(),
    ]
}

/// Inventory columns plus `change` (`KIND: reasons`).
#[must_use]
pub fn change_row(record: &ArtifactRecord, assessment: &ChangeAssessment) -> Vec<String> {
    let mut row = inventory_row(record);
    let reasons = assessment.reason_text();
    row.push(if reasons.is_empty() {
        assessment.kind.to_string()
    } else {
        format!("{}: {reasons}", assessment.kind)
    });
    row
}

/// Inventory columns plus `actual_length`, `hash` and `status`.
#[must_use]
pub fn download_row(record: &ArtifactRecord, status: &DownloadStatus) -> Vec<String> {
    let mut row = inventory_row(record);
    row.push(if record.actual_size > 0 {
        record.actual_size.to_string()
    } else {
        String::new()
    });
    row.push(record.content_hash.clone().unwrap_or_default());
    row.push(status.to_string());
    row
}

fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_inventory_row_formats() {
        let mut record = ArtifactRecord::new(
            "https://ec.europa.eu/download/attachments/467108974/eas-codes.xlsx?version=1&modificationDate=1761226169199",
        );
        record.effective_date = NaiveDate::from_ymd_opt(2025, 11, 15);
        record.publishing_date = NaiveDate::from_ymd_opt(2025, 10, 23);
        record.version = Some("15".to_string());
        record.is_latest_release = true;
        record.content_length = 150;
        record.last_modified = NaiveDate::from_ymd_opt(2025, 10, 23)
            .unwrap()
            .and_hms_opt(13, 29, 29);

        let row = inventory_row(&record);
        assert_eq!(row.len(), INVENTORY_HEADERS.len());
        assert_eq!(row[0], "15.11.2025");
        assert_eq!(row[1], "23.10.2025");
        assert_eq!(row[2], "15");
        assert_eq!(row[3], "EAS code list");
        assert_eq!(row[4], "true");
        assert_eq!(row[5], "2025-10-23 13:29:29.199");
        assert_eq!(row[7], "eas-codes.xlsx");
        assert_eq!(row[8], "XLSX");
        assert_eq!(row[9], "150");
        assert_eq!(row[11], "2025-10-23 13:29:29");
    }

    #[test]
    fn test_download_row_status_column() {
        let mut record = ArtifactRecord::new("https://ec.europa.eu/download/attachments/1/a.zip");
        record.actual_size = 5;
        record.content_hash = Some("abc".to_string());
        let row = download_row(&record, &DownloadStatus::Succeeded);
        assert_eq!(row.len(), DOWNLOAD_HEADERS.len());
        assert_eq!(&row[12..], ["5", "abc", "SUCCEEDED"]);

        let row = download_row(
            &ArtifactRecord::new("https://ec.europa.eu/download/attachments/1/a.zip"),
            &DownloadStatus::Failed("HTTP 404".to_string()),
        );
        assert_eq!(row[12], "");
        assert_eq!(row[14], "FAILED: HTTP 404");
    }
}
