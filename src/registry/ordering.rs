//! Deterministic ordering of artifact records.
//!
//! Used for the registry file and every tabular export so that repeated runs
//! over the same catalog produce byte-identical output.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::artifact::ArtifactRecord;

/// Date a record is ordered by: its effective date, else the calendar day of
/// the URL's `modificationDate=` timestamp (UTC).
#[must_use]
pub fn sort_date(record: &ArtifactRecord) -> Option<NaiveDate> {
    record
        .effective_date
        .or_else(|| record.modification_time().map(|time| time.date_naive()))
}

/// Total order over records.
///
/// 1. sort date ascending, dated records before undated ones
/// 2. category label
/// 3. lower-cased decoded filename
/// 4. URL, so distinct records never compare equal
#[must_use]
pub fn compare(a: &ArtifactRecord, b: &ArtifactRecord) -> Ordering {
    let by_date = match (sort_date(a), sort_date(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date
        .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        .then_with(|| {
            a.decoded_filename()
                .to_lowercase()
                .cmp(&b.decoded_filename().to_lowercase())
        })
        .then_with(|| a.url.cmp(&b.url))
}

/// Sorts records in place by [`compare`].
pub fn sort_records(records: &mut [ArtifactRecord]) {
    records.sort_by(compare);
}
