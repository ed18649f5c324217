//! Link and heading extraction from course page markup.
//!
//! Two pure transformations over already-fetched HTML:
//!
//! 1. **Weekly links**: anchors on the overview page whose `href` matches the
//!    content-view pattern `mod/oucontent/view.php?id=<digits>` become
//!    absolute, printable-view URLs, deduplicated in first-occurrence order.
//! 2. **Headings**: every `h1`/`h2` of a content page, in document order,
//!    whitespace-trimmed, for the table of contents.
//!
//! Neither function touches the network; both take the markup as a string.

use crate::error::EbookError;
use crate::models::{Heading, HeadingLevel};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

/// Href pattern identifying one week's content-view page.
static CONTENT_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"mod/oucontent/view\.php\?id=\d+").unwrap());

/// Query flag appended to every weekly link to request the printable
/// rendering of the page.
const PRINTABLE_FLAG: &str = "&printable=1";

/// Extract the ordered, deduplicated set of weekly content links.
///
/// Relative hrefs are resolved against `page_url` (the overview page's own
/// URL, as reported by the browser after navigation). Each resulting link has
/// the printable flag appended. Duplicates keep their first occurrence.
///
/// # Errors
///
/// [`EbookError::Discovery`] when zero anchors match the content pattern.
/// A page that loaded but genuinely has no weeks is indistinguishable from a
/// changed page structure; both are fatal.
#[instrument(level = "info", skip_all, fields(page_url = %page_url))]
pub fn extract_weekly_links(html: &str, page_url: &str) -> Result<Vec<String>, EbookError> {
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]").unwrap();

    let mut links = Vec::new();
    for element in document.select(&anchor_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !CONTENT_LINK_RE.is_match(href) {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            debug!(href, "Skipping unresolvable content href");
            continue;
        };
        links.push(format!("{resolved}{PRINTABLE_FLAG}"));
    }

    if links.is_empty() {
        return Err(EbookError::Discovery);
    }

    let unique: Vec<String> = links.into_iter().unique().collect();
    debug!(count = unique.len(), "Deduplicated weekly links");
    Ok(unique)
}

/// Count occurrences of the content-link pattern in raw markup.
///
/// Used by the fetcher to detect whether clicking the "All weeks" expander
/// actually revealed more weeks. Counts raw matches, not unique links.
pub fn count_content_anchors(html: &str) -> usize {
    CONTENT_LINK_RE.find_iter(html).count()
}

/// Extract every `h1` and `h2` of a content page, in document order.
///
/// An empty result is valid: a week with no section titles still gets a
/// "Week N" entry in the table of contents, just with nothing beneath it.
pub fn extract_headings(html: &str) -> Vec<Heading> {
    let document = Html::parse_document(html);
    let heading_selector = Selector::parse("h1, h2").unwrap();

    document
        .select(&heading_selector)
        .map(|element| {
            let level = match element.value().name() {
                "h1" => HeadingLevel::Top,
                _ => HeadingLevel::Sub,
            };
            let text = element.text().collect::<String>().trim().to_string();
            Heading { level, text }
        })
        .collect()
}
