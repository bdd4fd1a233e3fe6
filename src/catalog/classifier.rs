//! Link classification: downloadable artifact versus navigation noise.

use url::Url;

/// File extensions the catalog publishes artifacts under.
const ARTIFACT_EXTENSIONS: &[&str] = &["xlsx", "xls", "xml", "csv", "json", "zip", "pdf"];

/// Path markers of attachment download URLs.
const DOWNLOAD_MARKERS: &[&str] = &["/download/", "/attachments/"];

/// Fragments of navigation, paging and tracker URLs.
const NAVIGATION_MARKERS: &[&str] = &[
    "action=",
    "breadcrumbs",
    "skilink",
    "menu",
    "hierarchy",
    "#header",
    "#navigation",
    "pageid=",
    "display/",
    "github.com",
    "tracker/plugins",
];

/// Documentation hosts whose links are never catalog artifacts.
const EXCLUDED_HOSTS: &[&str] = &[
    "atlassian.com",
    "confluence.atlassian",
    "docs.atlassian",
    "support.atlassian",
];

/// Returns whether an absolute URL references a downloadable artifact.
///
/// All of the following must hold:
/// - the path (query ignored) ends in a known artifact extension
/// - the path carries a download or attachment marker
/// - the URL is not navigation/tracker noise
/// - the URL is not on an excluded documentation host
///
/// The last two exclusions are waived for attachment URLs, since trackers
/// sometimes wrap genuine attachment links.
#[must_use]
pub fn is_downloadable(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_lowercase();
    let lower = url.to_lowercase();

    let has_extension = path
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ARTIFACT_EXTENSIONS.contains(&ext));
    let is_download = DOWNLOAD_MARKERS.iter().any(|marker| path.contains(marker));

    let is_attachment = lower.contains("attachments");
    let is_navigation =
        !is_attachment && NAVIGATION_MARKERS.iter().any(|marker| lower.contains(marker));
    let is_excluded_host =
        !is_attachment && EXCLUDED_HOSTS.iter().any(|host| lower.contains(host));

    has_extension && is_download && !is_navigation && !is_excluded_host
}
