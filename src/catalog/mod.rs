//! Catalog analysis: link discovery and release metadata resolution.
//!
//! # Overview
//!
//! - [`is_downloadable`] - link classifier
//! - [`MetadataExtractor`] - bounded traversal of paragraphs and lists
//! - [`fallback`] - filename-derived version and effective date
//! - [`propagate`] - spreadsheet to archive metadata propagation
//!
//! [`scan_catalog`] does all document work synchronously and returns plain
//! data, so the parsed tree never lives across an `.await`.
//! [`enrich_records`] then applies the result to probed records.

mod classifier;
mod extractor;
pub mod fallback;
mod metadata;
pub mod propagate;
mod text;

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::artifact::ArtifactRecord;

pub use classifier::is_downloadable;
pub use extractor::{MAX_NESTING_DEPTH, MAX_SIBLING_STEPS, MetadataExtractor, resolve_link};
pub use metadata::{MetadataMap, ReleaseMetadata, merge};
pub use propagate::PairingRule;
pub use text::{find_version, normalize_version, normalize_whitespace, parse_block};

#[allow(clippy::expect_used)]
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// Everything a cycle needs from the catalog document.
#[derive(Debug, Clone, Default)]
pub struct CatalogScan {
    /// Downloadable links in document order, without duplicates.
    pub links: Vec<String>,
    /// URL to release metadata resolved from the catalog text.
    pub metadata: MetadataMap,
    /// Effective date to publishing date pairs stated in the catalog.
    pub publishing_dates: HashMap<NaiveDate, NaiveDate>,
}

/// Counters reported by [`enrich_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub from_text: usize,
    pub publishing_dates_filled: usize,
    pub propagated: usize,
}

/// Parses the catalog HTML and runs every document-level stage.
#[must_use]
#[instrument(skip(html), fields(base = %base, bytes = html.len()))]
pub fn scan_catalog(html: &str, base: &Url) -> CatalogScan {
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let links: Vec<String> = document
        .select(&ANCHOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .filter(|url| is_downloadable(url))
        .filter(|url| seen.insert(url.clone()))
        .collect();

    let extractor = MetadataExtractor::new(&document, base);
    let metadata = extractor.extract();
    let publishing_dates = extractor.publishing_dates();

    info!(
        links = links.len(),
        labelled = metadata.len(),
        publishing_dates = publishing_dates.len(),
        "catalog scanned"
    );
    CatalogScan {
        links,
        metadata,
        publishing_dates,
    }
}

/// Resolves release metadata on `records` from a catalog scan.
///
/// Stage order: catalog text, filename fallback, publishing-date map,
/// cross-artifact propagation. Each stage only fills what earlier stages left
/// empty, except propagation which refreshes the effective date and latest
/// flag on the archives it pairs.
pub fn enrich_records(
    records: &mut [ArtifactRecord],
    scan: &CatalogScan,
    rule: PairingRule,
) -> EnrichmentSummary {
    let mut summary = EnrichmentSummary::default();

    for record in records.iter_mut() {
        if let Some(metadata) = scan.metadata.get(&record.url) {
            metadata.fill(record);
            summary.from_text += 1;
        }
    }

    fallback::derive(records);
    summary.publishing_dates_filled =
        propagate::apply_publishing_dates(records, &scan.publishing_dates);
    summary.propagated = propagate::propagate_release_metadata(records, rule);

    debug!(
        from_text = summary.from_text,
        publishing_dates_filled = summary.publishing_dates_filled,
        propagated = summary.propagated,
        "release metadata resolved"
    );
    summary
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <ul>
            <li>15/11/25 | Published: 23/10/25 | EAS code list – version 15.0 (latest version)
              <a href="/download/attachments/467108974/eas-codes.xlsx?version=1&amp;modificationDate=1761226169199">EAS</a>
            </li>
          </ul>
          <p><a href="/download/attachments/467108974/eas-codes.xlsx?version=1&amp;modificationDate=1761226169199">again</a></p>
          <p><a href="/pages/viewpage.action?pageId=1">navigation</a></p>
          <p><a href="/download/attachments/467108974/en16931-ubl-1.3.15.zip">UBL</a></p>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://ec.europa.eu/digital-building-blocks/sites/spaces/DIGITAL/pages/467108974/Registry").unwrap()
    }

    #[test]
    fn test_scan_collects_unique_downloadable_links() {
        let scan = scan_catalog(PAGE, &base());
        assert_eq!(scan.links.len(), 2);
        assert!(scan.links[0].ends_with("eas-codes.xlsx?version=1&modificationDate=1761226169199"));
        assert!(scan.links[1].ends_with("en16931-ubl-1.3.15.zip"));
    }

    #[test]
    fn test_enrich_resolves_text_and_fallback_metadata() {
        let scan = scan_catalog(PAGE, &base());
        let mut records: Vec<ArtifactRecord> =
            scan.links.iter().cloned().map(ArtifactRecord::new).collect();
        let summary = enrich_records(&mut records, &scan, PairingRule::Tolerant);
        assert_eq!(summary.from_text, 1);

        let eas = &records[0];
        assert_eq!(eas.effective_date, NaiveDate::from_ymd_opt(2025, 11, 15));
        assert_eq!(eas.publishing_date, NaiveDate::from_ymd_opt(2025, 10, 23));
        assert_eq!(eas.version.as_deref(), Some("15"));
        assert!(eas.is_latest_release);

        let ubl = &records[1];
        assert_eq!(ubl.version.as_deref(), Some("1.3.15"));
        assert_eq!(ubl.effective_date, None);
    }

    #[test]
    fn test_enrich_text_wins_over_filename() {
        let html = r#"<ul><li>17/05/21 | Published: 01/04/21 | VATEX code list - version 3
            <a href="https://ec.europa.eu/download/attachments/1/vatex-2020-01-01-v9.xlsx">x</a></li></ul>"#;
        let scan = scan_catalog(html, &base());
        let mut records: Vec<ArtifactRecord> =
            scan.links.iter().cloned().map(ArtifactRecord::new).collect();
        enrich_records(&mut records, &scan, PairingRule::Tolerant);
        assert_eq!(records[0].version.as_deref(), Some("3"));
        assert_eq!(records[0].effective_date, NaiveDate::from_ymd_opt(2021, 5, 17));

        let mut bare = vec![ArtifactRecord::new(records[0].url.clone())];
        enrich_records(&mut bare, &CatalogScan::default(), PairingRule::Tolerant);
        assert_eq!(bare[0].version.as_deref(), Some("9"));
        assert_eq!(bare[0].effective_date, NaiveDate::from_ymd_opt(2020, 1, 1));
    }
}
