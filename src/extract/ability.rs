//! Ability listing and ability page extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::error::ExtractError;
use super::text::{compile_static_selector, element_text, normalize_ws, resolve_href};
use crate::model::AbilityRecord;

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));
static H1_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("h1"));
static H2_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("h2"));

/// Absolute ability page URLs linked from the ability listing.
///
/// Only hrefs shaped `/ability/<slug>` count. Order is first-seen, without
/// duplicates.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidPageUrl`] if `page_url` is not absolute.
#[instrument(skip(html), fields(html_len = html.len()))]
pub fn extract_ability_links(html: &str, page_url: &str) -> Result<Vec<String>, ExtractError> {
    let base = Url::parse(page_url).map_err(|e| ExtractError::invalid_page_url(page_url, &e))?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let links: Vec<String> = document
        .select(&ANCHOR_SEL)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| is_ability_path(href))
        .filter_map(|href| resolve_href(&base, href))
        .filter(|url| seen.insert(url.clone()))
        .collect();

    debug!(links = links.len(), "Extracted ability links");
    Ok(links)
}

fn is_ability_path(href: &str) -> bool {
    href.starts_with("/ability/") && href.matches('/').count() == 2
}

/// Builds an ability record from its page.
///
/// Returns `None` when the page has no `h1`.
#[must_use]
pub fn extract_ability(html: &str, page_url: &str) -> Option<AbilityRecord> {
    let document = Html::parse_document(html);
    let name = document
        .select(&H1_SEL)
        .next()
        .map(|h1| element_text(&h1).trim().to_string())?;

    let effect = document
        .select(&H2_SEL)
        .find(|h2| normalize_ws(&element_text(h2)) == "Effect")
        .and_then(|h2| {
            h2.next_siblings()
                .filter_map(scraper::ElementRef::wrap)
                .find(|el| el.value().name() == "p")
        })
        .map(|p| element_text(&p).trim().to_string())
        .unwrap_or_default();

    Some(AbilityRecord {
        name,
        url: page_url.to_string(),
        effect: Some(effect),
    })
}
