//! Evolution chart resolution: locate the current creature among the chart's
//! cards and emit its one-hop outgoing edges.
//!
//! The chart is read as a flat, ordered card sequence plus the flat sequence of
//! its text tokens. Triggers such as `(Level 16)` or `(use Water Stone)` are
//! found by scanning the tokens that follow the current creature's name.
//!
//! One trigger is looked up per page, from the current creature's name, and
//! attached to every edge emitted. On a branching chart whose branches carry
//! different triggers (Eevee's stones, for instance) every branch receives
//! the first trigger found. Without any trigger only the immediately
//! following card is emitted.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::error::ExtractError;
use super::text::{
    compile_static_regex, compile_static_selector, element_text, next_element_sibling,
    normalize_ws, own_text, resolve_href, to_slug,
};
use crate::model::EvolutionEdge;

/// Heading text that introduces the chart container.
const CHART_HEADING: &str = "Evolution chart";

/// Number of tokens after a name searched for a parenthesized trigger.
pub const TRIGGER_WINDOW: usize = 15;

static H1_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("h1"));
static H2_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("h2"));
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("th"));
static SMALL_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("small"));
static CARD_SEL: LazyLock<Selector> = LazyLock::new(|| {
    compile_static_selector(r#"div[class*="infocard"] a[href*="/pokedex/"][class*="ent-name"]"#)
});
static CARD_FALLBACK_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector(r#"a[href*="/pokedex/"]"#));

static CARD_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"#(\d{3,4})"));
static NATIONAL_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(\d{3,4})"));
static LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?i)Level\s*(\d+)"));
static USE_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?i)use\s+([^)]+)"));

/// One creature card of the chart, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionCard {
    pub name: String,
    /// Absolute URL of the card's detail page
    pub url: String,
    /// National number from the card's `#NNNN` text
    pub number: Option<String>,
}

/// Level and/or item parsed from a parenthesized trigger token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    pub level: Option<u32>,
    pub item: Option<String>,
}

/// Resolves the outgoing edges of the creature described by `document`.
///
/// Returns an empty list when the page has no chart or the current creature
/// cannot be located in it.
///
/// # Errors
///
/// Returns [`ExtractError::UnresolvableHref`] if a card link cannot be
/// resolved against `page`.
#[instrument(skip(document), fields(page = %page))]
pub fn resolve_next_evolutions(
    document: &Html,
    page: &Url,
) -> Result<Vec<EvolutionEdge>, ExtractError> {
    let Some(container) = chart_container(document) else {
        debug!("No evolution chart");
        return Ok(Vec::new());
    };

    let cards = collect_cards(&container, page)?;
    let Some(index) = locate_current(document, &cards, page) else {
        debug!(cards = cards.len(), "Current creature not found in evolution chart");
        return Ok(Vec::new());
    };

    let tokens = text_tokens(&container);
    let edges = emit_edges(&cards, index, &tokens);
    debug!(index, edges = edges.len(), "Resolved evolution edges");
    Ok(edges)
}

/// Element immediately following the "Evolution chart" heading.
fn chart_container(document: &Html) -> Option<ElementRef<'_>> {
    document
        .select(&H2_SEL)
        .find(|h2| normalize_ws(&element_text(h2)) == CHART_HEADING)
        .and_then(|h2| next_element_sibling(&h2))
}

/// Cards in document order, preferring `ent-name` anchors inside infocards.
///
/// # Errors
///
/// Returns [`ExtractError::UnresolvableHref`] for a card href that cannot be
/// joined to `page`.
pub fn collect_cards(
    container: &ElementRef<'_>,
    page: &Url,
) -> Result<Vec<EvolutionCard>, ExtractError> {
    let mut anchors: Vec<ElementRef<'_>> = container.select(&CARD_SEL).collect();
    if anchors.is_empty() {
        anchors = container.select(&CARD_FALLBACK_SEL).collect();
    }

    anchors
        .iter()
        .map(|anchor| {
            let href = anchor.value().attr("href").unwrap_or_default();
            let url = resolve_href(page, href)
                .ok_or_else(|| ExtractError::unresolvable_href(href, page.as_str()))?;
            Ok(EvolutionCard {
                name: normalize_ws(&element_text(anchor)),
                url,
                number: card_number(anchor),
            })
        })
        .collect()
}

/// `#NNNN` text of the card enclosing `anchor`.
///
/// The card is the closest ancestor carrying an `infocard` class; if there is
/// none the third ancestor is searched instead.
fn card_number(anchor: &ElementRef<'_>) -> Option<String> {
    let card = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().attr("class").is_some_and(|c| c.contains("infocard")))
        .or_else(|| anchor.ancestors().nth(2).and_then(ElementRef::wrap))?;

    card.select(&SMALL_SEL)
        .filter(|small| element_text(small).contains('#'))
        .flat_map(|small| {
            small
                .children()
                .filter_map(|node| node.value().as_text().map(|text| String::from(&**text)))
                .collect::<Vec<_>>()
        })
        .find_map(|text| CARD_NUMBER_RE.captures(&text).map(|caps| caps[1].to_string()))
}

/// Index of the current creature: by URL slug, else by national number or
/// heading name. The first match wins.
fn locate_current(document: &Html, cards: &[EvolutionCard], page: &Url) -> Option<usize> {
    let slug = to_slug(page.as_str());
    if let Some(index) = cards.iter().position(|card| to_slug(&card.url) == slug) {
        return Some(index);
    }

    let national = national_number(document);
    let heading = document
        .select(&H1_SEL)
        .next()
        .and_then(|h1| own_text(&h1))
        .map(|text| text.trim().to_lowercase())
        .filter(|text| !text.is_empty());

    cards.iter().position(|card| {
        let number_match = national.is_some() && card.number == national;
        let name_match = heading
            .as_deref()
            .is_some_and(|name| card.name.to_lowercase() == name);
        number_match || name_match
    })
}

fn national_number(document: &Html) -> Option<String> {
    let th = document
        .select(&TH_SEL)
        .find(|th| element_text(th).contains("National"))?;
    let td = th
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")?;
    let text = element_text(&td);
    NATIONAL_NUMBER_RE
        .captures(&text)
        .map(|caps| caps[1].to_string())
}

/// Non-empty, trimmed text nodes of the container in document order.
fn text_tokens(container: &ElementRef<'_>) -> Vec<String> {
    container
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// First fully parenthesized token within [`TRIGGER_WINDOW`] tokens after
/// the first occurrence of `name`.
#[must_use]
pub fn nearest_trigger<'a>(tokens: &'a [String], name: &str) -> Option<&'a str> {
    let position = tokens.iter().position(|token| token == name)?;
    tokens
        .iter()
        .skip(position + 1)
        .take(TRIGGER_WINDOW)
        .map(String::as_str)
        .find(|token| token.starts_with('(') && token.ends_with(')'))
}

/// Parses `Level N` and `use <item>` out of a trigger token.
#[must_use]
pub fn parse_trigger(text: &str) -> Trigger {
    Trigger {
        level: LEVEL_RE
            .captures(text)
            .and_then(|caps| caps[1].parse().ok())
            .filter(|level: &u32| *level > 0),
        item: USE_ITEM_RE
            .captures(text)
            .map(|caps| caps[1].trim().to_string()),
    }
}

/// Emits edges from `cards[current]` to the cards after it.
///
/// The trigger is looked up once, for the current card's name. With a
/// trigger, every later card receives an edge carrying it; without one, only
/// the next card receives an edge, with no level or item.
#[must_use]
pub fn emit_edges(cards: &[EvolutionCard], current: usize, tokens: &[String]) -> Vec<EvolutionEdge> {
    let Some(current_card) = cards.get(current) else {
        return Vec::new();
    };
    let trigger = nearest_trigger(tokens, &current_card.name).map(parse_trigger);

    let mut edges = Vec::new();
    for (offset, card) in cards.iter().skip(current + 1).enumerate() {
        if offset > 0 && trigger.is_none() {
            break;
        }
        let trigger = trigger.clone().unwrap_or_default();
        edges.push(EvolutionEdge {
            to_number: card.number.clone(),
            to_name: card.name.clone(),
            to_url: card.url.clone(),
            level: trigger.level,
            item: trigger.item,
        });
    }
    edges
}
