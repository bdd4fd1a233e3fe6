//! Text-level heuristics for release metadata in catalog prose.
//!
//! Catalog entries look like
//! `15/11/25 | Published: 23/10/25 | EAS code list – version 15.0 (latest version)`
//! but inline markup routinely splits dates (`15 /11/25`, `15/ 11/ 25`) and
//! older entries omit the publishing date entirely.

use std::sync::LazyLock;

use regex::Regex;

use super::metadata::ReleaseMetadata;
use crate::artifact::parse_ddmmyy;

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        #[allow(clippy::expect_used)]
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect(concat!(stringify!($name), " is valid")));
    };
}

lazy_regex!(SPLIT_BEFORE_SLASH, r"(\d{1,2})\s+(/\d{2}/\d{2})");
lazy_regex!(SPLIT_AFTER_SLASH, r"(\d{2})/\s+(\d{2})/\s+(\d{2})");
lazy_regex!(WHITESPACE_RUN, r"\s+");
lazy_regex!(PUBLISHED_MARKER, r"(?i)published:");
lazy_regex!(LOOSE_SHORT_DATE, r"(\d{1,2}\s*/?\s*\d{2}/\d{2})");
lazy_regex!(SHORT_DATE, r"\d{2}/\d{2}/\d{2}");
lazy_regex!(EXACT_SHORT_DATE, r"^\d{2}/\d{2}/\d{2}$");
lazy_regex!(VERSION_MULTI, r"(?i)\b(?:version|v)\s*(\d+(?:\.\d+)+)");
lazy_regex!(VERSION_SINGLE, r"(?i)\b(?:version|v)\s*(\d+)");
lazy_regex!(
    DATE_THEN_MULTI_VERSION,
    r"(?is)(\d{2}/\d{2}/\d{2}).*?\b(?:version|v)\s*(\d+(?:\.\d+){2,})"
);
lazy_regex!(
    DATE_THEN_VERSION,
    r"(?is)(\d{2}/\d{2}/\d{2}).*?\b(?:version|v)\s*(\d+(?:\.\d+)?)"
);
lazy_regex!(
    DATE_THEN_VERSION_WORD,
    r"(?is)\d{2}/\d{2}/\d{2}.*?\b(?:version\b|v\s*\d)"
);

/// Marker flagging the current release of a category.
pub const LATEST_MARKER: &str = "(latest version)";

/// Phrases that name a known artifact category in paragraph text.
const CATEGORY_PHRASES: &[&str] = &[
    "EAS code list",
    "VATEX code list",
    "VAT Exemption Reason Code list",
    "EN16931 code list",
    "Validation artefacts",
    "Validation artifacts",
    "Genericode files",
];

/// Extra phrases that qualify a list item on their own.
const LIST_ITEM_PHRASES: &[&str] = &["code lists as used in EN16931", "Published:"];

/// Repairs dates split by inline markup and collapses whitespace runs.
///
/// `"01 /02/21"` and `"01/ 02/ 21"` both become `"01/02/21"`.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let joined = SPLIT_BEFORE_SLASH.replace_all(text, "$1$2");
    let joined = SPLIT_AFTER_SLASH.replace_all(&joined, "$1/$2/$3");
    WHITESPACE_RUN.replace_all(&joined, " ").trim().to_string()
}

/// Drops a trailing `.0` from two-part versions: `"16.0"` becomes `"16"`.
///
/// Versions with three or more parts are returned unchanged.
#[must_use]
pub fn normalize_version(version: &str) -> String {
    match version.split_once('.') {
        Some((major, "0")) if !major.is_empty() => major.to_string(),
        _ => version.to_string(),
    }
}

/// Finds a `version N[.M...]` / `vN` token, preferring multi-part versions.
#[must_use]
pub fn find_version(text: &str) -> Option<String> {
    if let Some(caps) = VERSION_MULTI.captures(text) {
        return Some(normalize_version(&caps[1]));
    }
    VERSION_SINGLE.captures(text).map(|caps| caps[1].to_string())
}

/// Returns whether the text contains a `dd/mm/yy`-shaped substring.
#[must_use]
pub fn contains_short_date(text: &str) -> bool {
    SHORT_DATE.is_match(text)
}

/// Returns whether the text names one of the known artifact categories.
#[must_use]
pub fn names_category(text: &str) -> bool {
    CATEGORY_PHRASES.iter().any(|phrase| text.contains(phrase))
}

/// Returns whether a list item carries enough context to be scanned.
#[must_use]
pub fn list_item_qualifies(text: &str) -> bool {
    names_category(text)
        || LIST_ITEM_PHRASES.iter().any(|phrase| text.contains(phrase))
        || DATE_THEN_VERSION_WORD.is_match(text)
}

/// Returns whether the text mentions the GeneriCode companion format.
#[must_use]
pub fn mentions_genericode(text: &str) -> bool {
    text.contains("Genericode") || text.to_lowercase().contains("genericodes")
}

/// Parses one block of catalog text into a release metadata tuple.
///
/// With a `Published:` marker, the eight characters after it (whitespace
/// skipped) must form the `dd/mm/yy` publishing date, and the first date
/// before the marker is the effective date. Without any "published" text, a
/// `dd/mm/yy` date followed anywhere later by a version token is accepted.
/// Anything else yields `None`.
#[must_use]
pub fn parse_block(raw: &str) -> Option<ReleaseMetadata> {
    let text = normalize_whitespace(raw);
    let is_latest_release = text.contains(LATEST_MARKER);

    if let Some(marker) = PUBLISHED_MARKER.find(&text) {
        let publishing_date = text[marker.end()..]
            .trim_start()
            .chars()
            .take(8)
            .collect::<String>();
        let publishing_date = EXACT_SHORT_DATE
            .is_match(&publishing_date)
            .then(|| parse_ddmmyy(&publishing_date))
            .flatten();

        if publishing_date.is_some() {
            let effective_date = LOOSE_SHORT_DATE
                .captures(&text[..marker.start()])
                .map(|caps| normalize_whitespace(&caps[1]).replace(' ', ""))
                .filter(|candidate| EXACT_SHORT_DATE.is_match(candidate))
                .and_then(|candidate| parse_ddmmyy(&candidate));

            return Some(ReleaseMetadata {
                effective_date,
                publishing_date,
                version: find_version(&text),
                is_latest_release,
            });
        }
    }

    if text.to_lowercase().contains("published") {
        return None;
    }

    if let Some(caps) = DATE_THEN_MULTI_VERSION.captures(&text) {
        return Some(ReleaseMetadata {
            effective_date: parse_ddmmyy(&caps[1]),
            publishing_date: None,
            version: Some(caps[2].to_string()),
            is_latest_release,
        });
    }

    DATE_THEN_VERSION
        .captures(&text)
        .map(|caps| ReleaseMetadata {
            effective_date: parse_ddmmyy(&caps[1]),
            publishing_date: None,
            version: Some(normalize_version(&caps[2])),
            is_latest_release,
        })
}
