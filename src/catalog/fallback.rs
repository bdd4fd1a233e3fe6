//! Filename-based fallback for version and effective date.
//!
//! Only runs for fields the catalog text left empty. Transport timestamps
//! (Last-Modified, `modificationDate=`) are never used here.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::text::find_version;
use crate::artifact::{ArtifactRecord, find_iso_date, parse_ddmmyy};

#[allow(clippy::expect_used)]
static VALIDATION_ARTEFACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"en16931-(?:ubl|cii)-(\d+(?:\.\d+)+)\.zip").expect("artefact regex is valid")
});

#[allow(clippy::expect_used)]
static SHORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}/\d{2}/\d{2}").expect("short date regex is valid"));

/// Version embedded in a filename, if any.
///
/// Validation artefact archives (`en16931-ubl-1.3.15.zip`) yield their dotted
/// version as-is; otherwise a `version N[.M]` or `vN` token is used with the
/// usual `.0` normalization.
#[must_use]
pub fn version_from_filename(decoded: &str) -> Option<String> {
    let lower = decoded.to_lowercase();
    if let Some(caps) = VALIDATION_ARTEFACT.captures(&lower) {
        return Some(caps[1].to_string());
    }
    find_version(decoded)
}

/// Effective date embedded in a filename: `YYYY-MM-DD` first, then `dd/mm/yy`.
#[must_use]
pub fn effective_date_from_filename(decoded: &str) -> Option<chrono::NaiveDate> {
    find_iso_date(decoded).or_else(|| {
        SHORT_DATE
            .find(decoded)
            .and_then(|found| parse_ddmmyy(found.as_str()))
    })
}

/// Fills missing `version` and `effective_date` from each record's filename.
pub fn derive(records: &mut [ArtifactRecord]) {
    for record in records.iter_mut() {
        let decoded = record.decoded_filename();

        if !record.has_version() {
            if let Some(version) = version_from_filename(&decoded) {
                debug!(filename = %decoded, version = %version, "version derived from filename");
                record.version = Some(version);
            }
        }

        if record.effective_date.is_none() {
            if let Some(date) = effective_date_from_filename(&decoded) {
                debug!(filename = %decoded, effective = %date, "effective date derived from filename");
                record.effective_date = Some(date);
            }
        }
    }
}
