//! Release metadata tuples and the merge rule that combines them.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::artifact::ArtifactRecord;

/// Release metadata resolved for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseMetadata {
    pub effective_date: Option<NaiveDate>,
    pub publishing_date: Option<NaiveDate>,
    pub version: Option<String>,
    pub is_latest_release: bool,
}

impl ReleaseMetadata {
    /// Returns whether no field carries information.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effective_date.is_none()
            && self.publishing_date.is_none()
            && !has_text(self.version.as_deref())
            && !self.is_latest_release
    }

    /// Fills the empty release fields of `record` from this tuple.
    ///
    /// Same rule as [`merge`]: present values on the record are kept and the
    /// latest-release flag can only be raised.
    pub fn fill(&self, record: &mut ArtifactRecord) {
        if record.effective_date.is_none() {
            record.effective_date = self.effective_date;
        }
        if record.publishing_date.is_none() {
            record.publishing_date = self.publishing_date;
        }
        if !has_text(record.version.as_deref()) && has_text(self.version.as_deref()) {
            record.version.clone_from(&self.version);
        }
        record.is_latest_release |= self.is_latest_release;
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Combines two metadata tuples for the same URL.
///
/// Precedence: every field already present on `existing` wins; `incoming`
/// only fills fields that are absent (an empty version counts as absent).
/// `is_latest_release` is the logical OR of both, so once raised it never
/// drops back within a pass. The result does not depend on how many times the
/// same `incoming` is applied.
#[must_use]
pub fn merge(existing: ReleaseMetadata, incoming: &ReleaseMetadata) -> ReleaseMetadata {
    ReleaseMetadata {
        effective_date: existing.effective_date.or(incoming.effective_date),
        publishing_date: existing.publishing_date.or(incoming.publishing_date),
        version: if has_text(existing.version.as_deref()) {
            existing.version
        } else if has_text(incoming.version.as_deref()) {
            incoming.version.clone()
        } else {
            existing.version
        },
        is_latest_release: existing.is_latest_release || incoming.is_latest_release,
    }
}

/// URL to metadata mapping accumulated over one document pass.
///
/// Each extraction stage receives the map explicitly and folds its findings in
/// through [`merge`].
#[derive(Debug, Clone, Default)]
pub struct MetadataMap {
    entries: HashMap<String, ReleaseMetadata>,
}

impl MetadataMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `incoming` into whatever is already recorded for `url`.
    pub fn merge_into(&mut self, url: &str, incoming: &ReleaseMetadata) {
        let existing = self.entries.remove(url).unwrap_or_default();
        self.entries
            .insert(url.to_string(), merge(existing, incoming));
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<&ReleaseMetadata> {
        self.entries.get(url)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReleaseMetadata)> {
        self.entries.iter().map(|(url, meta)| (url.as_str(), meta))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tuple(
        effective: Option<(i32, u32, u32)>,
        version: Option<&str>,
        latest: bool,
    ) -> ReleaseMetadata {
        ReleaseMetadata {
            effective_date: effective.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            publishing_date: None,
            version: version.map(str::to_string),
            is_latest_release: latest,
        }
    }

    #[test]
    fn test_merge_keeps_existing_fields() {
        let existing = tuple(Some((2025, 11, 15)), Some("15"), false);
        let incoming = tuple(Some((2024, 1, 1)), Some("14"), false);
        let merged = merge(existing.clone(), &incoming);
        assert_eq!(merged, existing);
    }

    #[test]
    fn test_merge_fills_gaps() {
        let existing = tuple(None, Some(""), false);
        let mut incoming = tuple(Some((2021, 5, 17)), Some("7"), false);
        incoming.publishing_date = NaiveDate::from_ymd_opt(2021, 4, 1);
        let merged = merge(existing, &incoming);
        assert_eq!(merged.effective_date, NaiveDate::from_ymd_opt(2021, 5, 17));
        assert_eq!(merged.publishing_date, NaiveDate::from_ymd_opt(2021, 4, 1));
        assert_eq!(merged.version.as_deref(), Some("7"));
    }

    #[test]
    fn test_merge_latest_flag_never_reverts() {
        let merged = merge(tuple(None, None, true), &tuple(None, None, false));
        assert!(merged.is_latest_release);
        let merged = merge(tuple(None, None, false), &tuple(None, None, true));
        assert!(merged.is_latest_release);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = tuple(None, Some("3"), false);
        let incoming = tuple(Some((2020, 1, 1)), None, true);
        let once = merge(existing, &incoming);
        let twice = merge(once.clone(), &incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_metadata_map_merges_per_url() {
        let mut map = MetadataMap::new();
        map.merge_into("https://a/x.zip", &tuple(None, Some("2"), false));
        map.merge_into("https://a/x.zip", &tuple(Some((2022, 2, 2)), Some("9"), false));
        let entry = map.get("https://a/x.zip").unwrap();
        assert_eq!(entry.version.as_deref(), Some("2"));
        assert_eq!(entry.effective_date, NaiveDate::from_ymd_opt(2022, 2, 2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_fill_respects_record_values() {
        let mut record = ArtifactRecord::new("https://example.com/download/a.xlsx");
        record.version = Some("1".to_string());
        tuple(Some((2023, 3, 3)), Some("8"), true).fill(&mut record);
        assert_eq!(record.version.as_deref(), Some("1"));
        assert_eq!(record.effective_date, NaiveDate::from_ymd_opt(2023, 3, 3));
        assert!(record.is_latest_release);
    }
}
