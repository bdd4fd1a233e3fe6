//! Category detection from filename and URL shape.
//!
//! Categories double as storage subdirectory names and as the `category`
//! column of every export, so their display strings are stable.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::record::decode_filename;

#[allow(clippy::expect_used)]
static CATALOG_PAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/467108974/([^/]+?)(?:%20|\s)+(?:Code%20list|version)")
        .expect("catalog page name regex is valid")
});

/// Artifact category, derived from filename/URL conventions of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Electronic address scheme code list.
    Eas,
    /// VAT exemption reason code list.
    Vatex,
    /// Machine-readable GeneriCode archive of the EN 16931 code lists.
    GeneriCode,
    /// Spreadsheet listing of the EN 16931 code lists.
    En16931Xlsx,
    /// EN 16931 code list referenced only by its catalog page.
    En16931,
    /// Validation artefacts for the UBL syntax.
    ValidationUbl,
    /// Validation artefacts for the CII syntax.
    ValidationCii,
    /// Technical guidance documents.
    Guidance,
    /// Named by the catalog page but not one of the known kinds.
    Other(String),
    /// No rule matched; stored directly under the base path.
    #[default]
    Uncategorized,
}

impl Category {
    /// Stable display label, also used as the storage subdirectory.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eas => "EAS code list",
            Self::Vatex => "VATEX code list",
            Self::GeneriCode => "EN 16931 code list - GeneriCode",
            Self::En16931Xlsx => "EN 16931 code list - XLSX",
            Self::En16931 => "EN 16931 code list",
            Self::ValidationUbl => "validation-artefacts-UBL",
            Self::ValidationCii => "validation-artefacts-CII",
            Self::Guidance => "guidance",
            Self::Other(name) => name,
            Self::Uncategorized => "",
        }
    }

    /// Parses a label previously produced by [`Category::as_str`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "EAS code list" => Self::Eas,
            "VATEX code list" => Self::Vatex,
            "EN 16931 code list - GeneriCode" => Self::GeneriCode,
            "EN 16931 code list - XLSX" => Self::En16931Xlsx,
            "EN 16931 code list" => Self::En16931,
            "validation-artefacts-UBL" => Self::ValidationUbl,
            "validation-artefacts-CII" => Self::ValidationCii,
            "guidance" => Self::Guidance,
            "" => Self::Uncategorized,
            other => Self::Other(other.to_string()),
        }
    }

    /// Detects the category of an artifact from its raw filename and URL.
    ///
    /// Rules are evaluated against the decoded, lower-cased filename and the
    /// first match wins. The catalog page name embedded in the URL is the
    /// last resort.
    #[must_use]
    pub fn detect(raw_filename: &str, url: &str) -> Self {
        let name = decode_filename(raw_filename).to_lowercase();

        if name.contains("address") && name.contains("scheme") && name.ends_with(".xlsx") {
            return Self::Eas;
        }
        if name.contains("exemption")
            && (name.contains("vatex") || name.contains("vat exemption"))
            && name.ends_with(".xlsx")
        {
            return Self::Vatex;
        }
        if name.ends_with(".xlsx") && starts_with_token(&name, "eas") {
            return Self::Eas;
        }
        if name.ends_with(".xlsx") && starts_with_token(&name, "vatex") {
            return Self::Vatex;
        }
        if name.contains("genericodes") && name.ends_with(".zip") {
            return Self::GeneriCode;
        }
        if (name.contains("en16931") || name.contains("en 16931"))
            && name.contains("code lists")
            && name.ends_with(".xlsx")
        {
            return Self::En16931Xlsx;
        }
        if name.ends_with(".zip") && name.contains("en16931") {
            if name.starts_with("en16931-ubl-") {
                return Self::ValidationUbl;
            }
            if name.starts_with("en16931-cii-") {
                return Self::ValidationCii;
            }
            return Self::GeneriCode;
        }
        if name.contains("technical guidance") && name.ends_with(".pdf") {
            return Self::Guidance;
        }

        match CATALOG_PAGE_NAME.captures(url) {
            Some(caps) => match caps[1].to_ascii_uppercase().as_str() {
                "EAS" => Self::Eas,
                "VATEX" => Self::Vatex,
                "EN16931" => Self::En16931,
                _ => Self::Other(caps[1].to_string()),
            },
            None => Self::Uncategorized,
        }
    }
}

/// Returns whether `name` starts with `token` followed by a separator.
fn starts_with_token(name: &str, token: &str) -> bool {
    name.strip_prefix(token)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|next| matches!(next, '-' | '_' | ' ' | '.'))
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://ec.europa.eu/download/attachments/467108974";

    #[test]
    fn test_category_eas_spreadsheet() {
        let name = "Electronic%20Address%20Scheme%20Code%20list%20-%20version%2015.xlsx";
        assert_eq!(Category::detect(name, BASE), Category::Eas);
    }

    #[test]
    fn test_category_short_prefixed_names() {
        assert_eq!(Category::detect("eas-codes.xlsx", BASE), Category::Eas);
        assert_eq!(Category::detect("VATEX_2024.xlsx", BASE), Category::Vatex);
        assert_eq!(Category::detect("easter.xlsx", BASE), Category::Uncategorized);
    }

    #[test]
    fn test_category_vatex_spreadsheet() {
        let name = "VATEX%20-%20VAT%20exemption%20reason%20code%20list.xlsx";
        assert_eq!(Category::detect(name, BASE), Category::Vatex);
    }

    #[test]
    fn test_category_genericode_archives() {
        assert_eq!(
            Category::detect("cef-genericodes-2024-11-15.zip", BASE),
            Category::GeneriCode
        );
        assert_eq!(
            Category::detect("EN16931%20code%20lists%20values.zip", BASE),
            Category::GeneriCode
        );
    }

    #[test]
    fn test_category_en16931_spreadsheet() {
        let name = "EN16931%20code%20lists%20values%20-%20used%20from%202021-05-17.xlsx";
        assert_eq!(Category::detect(name, BASE), Category::En16931Xlsx);
    }

    #[test]
    fn test_category_validation_artefacts_by_syntax() {
        assert_eq!(
            Category::detect("en16931-ubl-1.3.15.zip", BASE),
            Category::ValidationUbl
        );
        assert_eq!(
            Category::detect("en16931-cii-1.3.15.zip", BASE),
            Category::ValidationCii
        );
    }

    #[test]
    fn test_category_guidance_pdf() {
        let name = "EN16931%20technical%20guidance%20v2.pdf";
        assert_eq!(Category::detect(name, BASE), Category::Guidance);
    }

    #[test]
    fn test_category_from_catalog_page_name() {
        let url = "https://ec.europa.eu/pages/467108974/EAS%20Code%20list/file.csv";
        assert_eq!(Category::detect("file.csv", url), Category::Eas);

        let url = "https://ec.europa.eu/pages/467108974/ICD%20version/file.csv";
        assert_eq!(
            Category::detect("file.csv", url),
            Category::Other("ICD".to_string())
        );
    }

    #[test]
    fn test_category_uncategorized_when_nothing_matches() {
        assert_eq!(
            Category::detect("notes.csv", "https://example.com/download/notes.csv"),
            Category::Uncategorized
        );
        assert_eq!(Category::Uncategorized.as_str(), "");
    }

    #[test]
    fn test_category_label_roundtrips_through_serde() {
        let json = serde_json::to_string(&Category::ValidationCii).unwrap();
        assert_eq!(json, "\"validation-artefacts-CII\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::ValidationCii);
    }
}
