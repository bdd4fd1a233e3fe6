//! Cross-artifact propagation of release metadata.
//!
//! The EN 16931 code list spreadsheet is described in the catalog text while
//! the GeneriCode archive of the same release usually is not. Once the
//! spreadsheet's metadata is resolved it is copied onto the archive that
//! belongs to the same release, matched by dates embedded in the filenames.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact::{ArtifactRecord, find_iso_date};

/// Maximum distance between archive date and effective date for dated archives.
pub const DATED_ARCHIVE_TOLERANCE_DAYS: i64 = 7;

/// How loosely archives are paired with their canonical spreadsheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingRule {
    /// Exact date equality, plus same-month (legacy archives) and a 7-day
    /// window (dated archives).
    #[default]
    Tolerant,
    /// Exact date equality only.
    Strict,
}

/// Naming conventions of GeneriCode archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveShape {
    /// `EN16931 code lists values - genericodes - used from YYYY-MM-DD.zip`
    Legacy,
    /// `cef-genericodes-YYYY-MM-DD.zip` / `digital-genericodes-YYYY-MM-DD.zip`
    Dated,
}

fn archive_shape(decoded_lower: &str) -> Option<ArchiveShape> {
    if !decoded_lower.ends_with(".zip") {
        return None;
    }
    if decoded_lower.starts_with("cef-genericodes-")
        || decoded_lower.starts_with("digital-genericodes-")
    {
        return Some(ArchiveShape::Dated);
    }
    if decoded_lower.contains("en16931") && decoded_lower.contains("genericodes") {
        return Some(ArchiveShape::Legacy);
    }
    None
}

fn is_canonical(record: &ArtifactRecord) -> bool {
    let name = record.decoded_filename().to_lowercase();
    name.contains("en16931") && name.contains("code lists") && name.ends_with(".xlsx")
}

/// Snapshot of a canonical spreadsheet's resolved metadata.
#[derive(Debug, Clone)]
struct Canonical {
    filename: String,
    filename_date: Option<NaiveDate>,
    effective_date: NaiveDate,
    publishing_date: Option<NaiveDate>,
    version: String,
    is_latest_release: bool,
}

impl Canonical {
    fn from_record(record: &ArtifactRecord) -> Option<Self> {
        if !is_canonical(record) || !record.has_version() {
            return None;
        }
        let filename = record.decoded_filename();
        Some(Self {
            filename_date: find_iso_date(&filename),
            filename,
            effective_date: record.effective_date?,
            publishing_date: record.publishing_date,
            version: record.version.clone()?,
            is_latest_release: record.is_latest_release,
        })
    }

    fn pairs_with(&self, shape: ArchiveShape, archive_date: NaiveDate, rule: PairingRule) -> bool {
        let exact = archive_date == self.effective_date || Some(archive_date) == self.filename_date;
        if exact || rule == PairingRule::Strict {
            return exact;
        }
        match shape {
            ArchiveShape::Legacy => {
                archive_date.year() == self.effective_date.year()
                    && archive_date.month() == self.effective_date.month()
            }
            ArchiveShape::Dated => {
                (archive_date - self.effective_date).num_days().abs() <= DATED_ARCHIVE_TOLERANCE_DAYS
            }
        }
    }

    fn apply(&self, target: &mut ArtifactRecord) {
        target.effective_date = Some(self.effective_date);
        if target.publishing_date.is_none() {
            target.publishing_date = self.publishing_date;
        }
        target.version = Some(self.version.clone());
        target.is_latest_release = self.is_latest_release;
    }
}

/// Copies canonical spreadsheet metadata onto paired GeneriCode archives.
///
/// Targets that already carry a version are never revisited, so repeated
/// passes are no-ops. On a match the effective date and latest flag are taken
/// from the canonical record; the publishing date only fills a gap.
///
/// Returns the number of archives updated.
pub fn propagate_release_metadata(records: &mut [ArtifactRecord], rule: PairingRule) -> usize {
    let sources: Vec<Canonical> = records.iter().filter_map(Canonical::from_record).collect();
    let mut updated = 0;

    for source in &sources {
        for target in records.iter_mut() {
            if target.has_version() {
                continue;
            }
            let decoded = target.decoded_filename();
            let Some(shape) = archive_shape(&decoded.to_lowercase()) else {
                continue;
            };
            let Some(archive_date) = find_iso_date(&decoded) else {
                continue;
            };
            if !source.pairs_with(shape, archive_date, rule) {
                continue;
            }

            source.apply(target);
            updated += 1;
            debug!(
                source = %source.filename,
                target = %decoded,
                version = %source.version,
                effective = %source.effective_date,
                "propagated release metadata"
            );
        }
    }

    if updated > 0 {
        info!(archives = updated, "propagated release metadata to paired archives");
    }
    updated
}

/// Fills missing publishing dates from an effective-date keyed map.
///
/// Returns the number of records updated.
pub fn apply_publishing_dates(
    records: &mut [ArtifactRecord],
    dates: &HashMap<NaiveDate, NaiveDate>,
) -> usize {
    let mut updated = 0;
    for record in records.iter_mut() {
        if record.publishing_date.is_some() {
            continue;
        }
        let Some(published) = record.effective_date.and_then(|date| dates.get(&date)) else {
            continue;
        };
        record.publishing_date = Some(*published);
        updated += 1;
        debug!(
            filename = %record.decoded_filename(),
            published = %published,
            "publishing date filled from catalog"
        );
    }
    updated
}
