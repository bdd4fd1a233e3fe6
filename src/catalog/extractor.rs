//! Metadata extraction from the catalog document tree.
//!
//! Extraction runs as three stages over one [`MetadataMap`]:
//!
//! 1. [`MetadataExtractor::list_item_pass`] - each qualifying `<li>` is parsed
//!    on its own text and its metadata goes to the links it directly owns
//! 2. [`MetadataExtractor::paragraph_pass`] - category/"Published:" paragraphs,
//!    combined with adjacent paragraphs for context, label their links and the
//!    links of adjacent paragraphs
//! 3. [`MetadataExtractor::inheritance_pass`] - links in lists nested directly
//!    under a qualifying `<li>` inherit the parent's metadata
//!
//! Stages are ordered from most to least specific. Because [`merge`] never
//! overwrites a present field, the first stage to supply a field wins.
//!
//! [`merge`]: super::metadata::merge

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::classifier::is_downloadable;
use super::metadata::{MetadataMap, ReleaseMetadata};
use super::text::{
    contains_short_date, list_item_qualifies, mentions_genericode, names_category,
    normalize_whitespace, parse_block,
};
use crate::artifact::parse_ddmmyy;

macro_rules! lazy_selector {
    ($name:ident, $css:expr) => {
        #[allow(clippy::expect_used)]
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect(concat!($css, " is a valid selector")));
    };
}

lazy_selector!(PARAGRAPH, "p");
lazy_selector!(LIST_ITEM, "li");
lazy_selector!(LINK, "a[href]");

/// How many following siblings of a category paragraph are searched for lists.
pub const MAX_SIBLING_STEPS: usize = 5;

/// How deep inside a non-list sibling the search for nested lists descends.
pub const MAX_NESTING_DEPTH: usize = 6;

/// Elements rendered on their own line; their text is space-separated.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "br", "tr", "td", "th", "table", "h1", "h2", "h3", "h4",
    "h5", "h6", "section", "blockquote",
];

/// Resolves an `href` against the document base URL.
#[must_use]
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Extracts URL to release metadata mappings from a parsed catalog page.
pub struct MetadataExtractor<'a> {
    document: &'a Html,
    base: &'a Url,
}

impl<'a> MetadataExtractor<'a> {
    #[must_use]
    pub fn new(document: &'a Html, base: &'a Url) -> Self {
        Self { document, base }
    }

    /// Runs every stage and returns the accumulated mapping.
    #[must_use]
    pub fn extract(&self) -> MetadataMap {
        let mut map = MetadataMap::new();
        self.list_item_pass(&mut map);
        self.paragraph_pass(&mut map);
        self.inheritance_pass(&mut map);
        debug!(urls = map.len(), "extracted release metadata from catalog text");
        map
    }

    /// Labels links owned by list items that carry their own metadata.
    ///
    /// Items qualify by their text, or by sitting in a list that follows a
    /// category paragraph within [`MAX_SIBLING_STEPS`] siblings.
    pub fn list_item_pass(&self, map: &mut MetadataMap) {
        let mut contextual = HashSet::new();
        for paragraph in self.document.select(&PARAGRAPH) {
            if names_category(&element_text(paragraph)) {
                for list in lists_following(paragraph) {
                    contextual.extend(list.select(&LIST_ITEM).map(|item| item.id()));
                }
            }
        }

        for item in self.document.select(&LIST_ITEM) {
            let text = own_text(item);
            if !contextual.contains(&item.id()) && !list_item_qualifies(&text) {
                continue;
            }
            let Some(metadata) = parse_block(&text) else {
                continue;
            };
            associate(map, &self.owned_links(item), &metadata, "list item");
        }
    }

    /// Labels links in and around paragraphs that name a category or carry a
    /// "Published:" marker.
    ///
    /// The preceding paragraph is prepended when it supplies date/category
    /// context, the following one appended when it mentions GeneriCode, a date
    /// or a version. The resulting tuple goes to links of the paragraph, of the
    /// following paragraph (when it mentions GeneriCode or has links) and, for
    /// a link-less "Published:" paragraph, of the preceding paragraph.
    pub fn paragraph_pass(&self, map: &mut MetadataMap) {
        for paragraph in self.document.select(&PARAGRAPH) {
            let text = element_text(paragraph);
            let has_published = text.contains("Published:");
            if !names_category(&text) && !has_published {
                continue;
            }

            let previous = previous_element(paragraph).filter(|el| is_tag(*el, "p"));
            let next = next_element(paragraph).filter(|el| is_tag(*el, "p"));

            let mut combined = text.clone();
            if let Some(previous) = previous {
                let previous_text = element_text(previous);
                if contains_short_date(&previous_text)
                    || previous_text.contains("Published:")
                    || names_category(&previous_text)
                {
                    combined = format!("{previous_text} {combined}");
                }
            }
            if let Some(next) = next {
                let next_text = element_text(next);
                if mentions_genericode(&next_text)
                    || contains_short_date(&next_text)
                    || next_text.contains("version")
                {
                    combined = format!("{combined} {next_text}");
                }
            }

            let Some(metadata) = parse_block(&combined) else {
                continue;
            };

            let own_links = self.links_in(paragraph);
            associate(map, &own_links, &metadata, "paragraph");

            if let Some(next) = next {
                let next_links = self.links_in(next);
                if mentions_genericode(&element_text(next)) || !next_links.is_empty() {
                    associate(map, &next_links, &metadata, "following paragraph");
                }
            }
            if has_published && own_links.is_empty() {
                if let Some(previous) = previous {
                    associate(map, &self.links_in(previous), &metadata, "preceding paragraph");
                }
            }
        }
    }

    /// Passes a qualifying list item's metadata down to its direct sublists.
    pub fn inheritance_pass(&self, map: &mut MetadataMap) {
        for item in self.document.select(&LIST_ITEM) {
            let text = own_text(item);
            if !list_item_qualifies(&text) {
                continue;
            }
            let Some(metadata) = parse_block(&text) else {
                continue;
            };
            for sublist in item.children().filter_map(ElementRef::wrap).filter(|el| is_list(*el)) {
                associate(map, &self.links_in(sublist), &metadata, "parent list item");
            }
        }
    }

    /// Maps effective dates to publishing dates from every "Published:" block.
    ///
    /// When a block has no effective date of its own, the first date of the
    /// preceding paragraph (for `<p>`) or of the item itself (for `<li>`) is
    /// used, unless it equals the publishing date.
    #[must_use]
    pub fn publishing_dates(&self) -> HashMap<NaiveDate, NaiveDate> {
        let mut dates = HashMap::new();

        for paragraph in self.document.select(&PARAGRAPH) {
            let text = element_text(paragraph);
            let Some((effective, published)) = published_pair(&text) else {
                continue;
            };
            let effective = effective.or_else(|| {
                previous_element(paragraph)
                    .filter(|el| is_tag(*el, "p"))
                    .and_then(|el| first_short_date(&element_text(el)))
                    .filter(|date| *date != published)
            });
            if let Some(effective) = effective {
                dates.insert(effective, published);
            }
        }

        for item in self.document.select(&LIST_ITEM) {
            let text = element_text(item);
            let Some((effective, published)) = published_pair(&text) else {
                continue;
            };
            let effective =
                effective.or_else(|| first_short_date(&text).filter(|date| *date != published));
            if let Some(effective) = effective {
                dates.insert(effective, published);
            }
        }

        dates
    }

    /// Downloadable links anywhere under `element`, document order, deduplicated.
    fn links_in(&self, element: ElementRef<'_>) -> Vec<String> {
        self.collect_links(element, |_| true)
    }

    /// Downloadable links whose nearest enclosing `<li>` is `item`.
    fn owned_links(&self, item: ElementRef<'_>) -> Vec<String> {
        self.collect_links(item, |link| {
            nearest_list_item(link).is_some_and(|owner| owner.id() == item.id())
        })
    }

    fn collect_links<F>(&self, element: ElementRef<'_>, keep: F) -> Vec<String>
    where
        F: Fn(ElementRef<'_>) -> bool,
    {
        let mut seen = HashSet::new();
        element
            .select(&LINK)
            .filter(|link| keep(*link))
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| resolve_link(self.base, href))
            .filter(|url| is_downloadable(url))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

fn associate(map: &mut MetadataMap, urls: &[String], metadata: &ReleaseMetadata, source: &str) {
    for url in urls {
        map.merge_into(url, metadata);
        debug!(
            url = %url,
            source,
            effective = ?metadata.effective_date,
            published = ?metadata.publishing_date,
            version = ?metadata.version,
            "associated release metadata"
        );
    }
}

fn published_pair(text: &str) -> Option<(Option<NaiveDate>, NaiveDate)> {
    if !text.contains("Published:") {
        return None;
    }
    let metadata = parse_block(text)?;
    Some((metadata.effective_date, metadata.publishing_date?))
}

fn first_short_date(text: &str) -> Option<NaiveDate> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '/'))
        .filter(|token| token.len() == 8)
        .find_map(parse_ddmmyy)
}

fn is_tag(element: ElementRef<'_>, name: &str) -> bool {
    element.value().name() == name
}

fn is_list(element: ElementRef<'_>) -> bool {
    is_tag(element, "ul") || is_tag(element, "ol")
}

fn next_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

fn previous_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.prev_siblings().find_map(ElementRef::wrap)
}

fn nearest_list_item(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| is_tag(*ancestor, "li"))
}

/// Lists within [`MAX_SIBLING_STEPS`] following siblings of `start`.
///
/// A sibling that is itself a list ends the search. Other siblings are
/// searched breadth-first for their outermost nested lists.
fn lists_following(start: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut found = Vec::new();
    for sibling in start
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take(MAX_SIBLING_STEPS)
    {
        if is_list(sibling) {
            found.push(sibling);
            break;
        }
        found.extend(outermost_lists(sibling));
    }
    found
}

/// Breadth-first search for lists below `root`, at most [`MAX_NESTING_DEPTH`]
/// levels deep. Lists are not descended into.
fn outermost_lists(root: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut lists = Vec::new();
    let mut queue = VecDeque::from([(root, 0_usize)]);
    while let Some((element, depth)) = queue.pop_front() {
        if depth >= MAX_NESTING_DEPTH {
            continue;
        }
        for child in element.children().filter_map(ElementRef::wrap) {
            if is_list(child) {
                lists.push(child);
            } else {
                queue.push_back((child, depth + 1));
            }
        }
    }
    lists
}

/// Normalized text of `element` and all descendants.
fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out, false);
    normalize_whitespace(&out)
}

/// Normalized text of a list item, excluding its nested lists.
fn own_text(item: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(item, &mut out, true);
    normalize_whitespace(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String, skip_lists: bool) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            if skip_lists && is_list(child) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&child.value().name());
            if block {
                out.push(' ');
            }
            collect_text(child, out, skip_lists);
            if block {
                out.push(' ');
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BASE: &str = "https://ec.europa.eu/sites/pages/467108974/Registry";

    fn extract(html: &str) -> MetadataMap {
        let document = Html::parse_document(html);
        let base = Url::parse(BASE).unwrap();
        MetadataExtractor::new(&document, &base).extract()
    }

    fn url(path: &str) -> String {
        format!("https://ec.europa.eu/download/attachments/467108974/{path}")
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_extractor_list_item_entry() {
        let map = extract(
            r#"<ul><li>15/11/25 | Published: 23/10/25 | EAS code list – version 15.0 (latest version)
               <a href="/download/attachments/467108974/eas-codes.xlsx">EAS</a></li></ul>"#,
        );
        let meta = map.get(&url("eas-codes.xlsx")).unwrap();
        assert_eq!(meta.effective_date, date(2025, 11, 15));
        assert_eq!(meta.publishing_date, date(2025, 10, 23));
        assert_eq!(meta.version.as_deref(), Some("15"));
        assert!(meta.is_latest_release);
    }

    #[test]
    fn test_extractor_repairs_dates_split_by_markup() {
        let map = extract(
            r#"<ul><li><strong>01</strong> /02/21 | Published: 01/02/21 – EN16931 Validation artefacts for UBL 2.1 - version 1.3.4
               <a href="/download/attachments/467108974/en16931-ubl-1.3.4.zip">UBL</a></li></ul>"#,
        );
        let meta = map.get(&url("en16931-ubl-1.3.4.zip")).unwrap();
        assert_eq!(meta.effective_date, date(2021, 2, 1));
        assert_eq!(meta.version.as_deref(), Some("1.3.4"));
    }

    #[test]
    fn test_extractor_paragraph_links_and_following_paragraph() {
        let map = extract(
            r#"<p>16/11/20 | Published: 02/10/20 | EN16931 code lists version 6.0
                 <a href="/download/attachments/467108974/EN16931%20code%20lists%20values%20v6.xlsx">xlsx</a></p>
               <p>Genericode files: <a href="/download/attachments/467108974/cef-genericodes-2020-11-16.zip">zip</a></p>"#,
        );
        let xlsx = map
            .get(&url("EN16931%20code%20lists%20values%20v6.xlsx"))
            .unwrap();
        assert_eq!(xlsx.effective_date, date(2020, 11, 16));
        assert_eq!(xlsx.publishing_date, date(2020, 10, 2));
        assert_eq!(xlsx.version.as_deref(), Some("6"));
        let zip = map.get(&url("cef-genericodes-2020-11-16.zip")).unwrap();
        assert_eq!(zip.version.as_deref(), Some("6"));
    }

    #[test]
    fn test_extractor_published_paragraph_labels_previous_links() {
        let map = extract(
            r#"<p>VATEX code list <a href="/download/attachments/467108974/vatex.xlsx">file</a></p>
               <p>15/05/25 | Published: 04/04/25 | version 5</p>"#,
        );
        let meta = map.get(&url("vatex.xlsx")).unwrap();
        assert_eq!(meta.publishing_date, date(2025, 4, 4));
        assert_eq!(meta.version.as_deref(), Some("5"));
    }

    #[test]
    fn test_extractor_lists_after_category_paragraph() {
        let map = extract(
            r#"<p>EAS code list</p>
               <div><span>history</span>
                 <ul><li>14/11/18 | – initial release v1
                   <a href="/download/attachments/467108974/eas-v1.xlsx">v1</a></li></ul>
               </div>"#,
        );
        let meta = map.get(&url("eas-v1.xlsx")).unwrap();
        assert_eq!(meta.effective_date, date(2018, 11, 14));
        assert_eq!(meta.version.as_deref(), Some("1"));
    }

    #[test]
    fn test_extractor_nested_items_inherit_and_keep_their_own() {
        let map = extract(
            r#"<ul><li>15/11/25 | Published: 23/10/25 | Validation artefacts – version 1.3.15 (latest version)
                 <ul>
                   <li><a href="/download/attachments/467108974/en16931-ubl-1.3.15.zip">UBL</a></li>
                   <li>01/12/25 | Published: 20/11/25 | CII hotfix
                       <a href="/download/attachments/467108974/en16931-cii-1.3.15.zip">CII</a></li>
                 </ul></li></ul>"#,
        );
        let ubl = map.get(&url("en16931-ubl-1.3.15.zip")).unwrap();
        assert_eq!(ubl.effective_date, date(2025, 11, 15));
        assert_eq!(ubl.version.as_deref(), Some("1.3.15"));
        assert!(ubl.is_latest_release);

        let cii = map.get(&url("en16931-cii-1.3.15.zip")).unwrap();
        assert_eq!(cii.effective_date, date(2025, 12, 1));
        assert_eq!(cii.publishing_date, date(2025, 11, 20));
        assert_eq!(cii.version.as_deref(), Some("1.3.15"));
    }

    #[test]
    fn test_extractor_ignores_navigation_links() {
        let map = extract(
            r#"<p>EAS code list 15/11/25 | Published: 23/10/25
                 <a href="https://github.com/org/repo/download/eas.zip">mirror</a></p>"#,
        );
        assert!(map.is_empty());
    }

    #[test]
    fn test_extractor_publishing_date_map() {
        let document = Html::parse_document(
            r#"<p>17/05/21</p><p>Published: 01/04/21</p>
               <ul><li>15/11/25 | Published: 23/10/25 | EAS code list</li></ul>"#,
        );
        let base = Url::parse(BASE).unwrap();
        let dates = MetadataExtractor::new(&document, &base).publishing_dates();
        assert_eq!(dates.get(&date(2021, 5, 17).unwrap()).copied(), date(2021, 4, 1));
        assert_eq!(dates.get(&date(2025, 11, 15).unwrap()).copied(), date(2025, 10, 23));
    }

    #[test]
    fn test_extractor_outermost_list_search_is_bounded() {
        let mut html = String::from("<div id=\"root\">");
        for _ in 0..MAX_NESTING_DEPTH + 2 {
            html.push_str("<div>");
        }
        html.push_str("<ul><li>x</li></ul>");
        for _ in 0..MAX_NESTING_DEPTH + 2 {
            html.push_str("</div>");
        }
        html.push_str("</div>");
        let document = Html::parse_fragment(&html);
        let root = document
            .select(&Selector::parse("#root").unwrap())
            .next()
            .unwrap();
        assert!(outermost_lists(root).is_empty());
    }
}
