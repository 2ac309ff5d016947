//! Listing page extraction: one table row becomes one [`PokemonStub`].

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::error::ExtractError;
use super::text::{
    compile_static_regex, compile_static_selector, detect_form, element_text, own_text,
    resolve_href, to_slug,
};
use crate::model::PokemonStub;

static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("table#pokedex tbody tr"));
static ROW_FALLBACK_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("table.data-table tbody tr"));
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("td"));
static NUM_CELL_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("td.cell-num"));
static FIRST_CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("td:nth-child(1)"));
static NAME_ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("td.cell-name a.ent-name"));
static NAME_ANCHOR_FALLBACK_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("td:nth-child(2) a"));
static TYPE_ICON_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("td:nth-child(3) a.type-icon"));
static TYPE_ICON_FALLBACK_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector("td.cell-icon a"));

static DEX_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\d{1,4}"));

/// Stubs extracted from one listing document.
#[derive(Debug, Default)]
pub struct ListingResult {
    /// Rows that produced a stub, in document order
    pub stubs: Vec<PokemonStub>,
    /// Rows dropped for lacking cells or a resolvable detail link
    pub skipped: usize,
}

/// Extracts a stub from every row of the listing table.
///
/// Rows are taken from `table#pokedex`, falling back to any
/// `table.data-table`. Rows that cannot yield a stub are counted in
/// [`ListingResult::skipped`], never surfaced as errors.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidPageUrl`] if `page_url` is not absolute.
#[instrument(skip(html), fields(html_len = html.len()))]
pub fn extract_listing(html: &str, page_url: &str) -> Result<ListingResult, ExtractError> {
    let base = Url::parse(page_url).map_err(|e| ExtractError::invalid_page_url(page_url, &e))?;
    let document = Html::parse_document(html);

    let mut rows: Vec<ElementRef<'_>> = document.select(&ROW_SEL).collect();
    if rows.is_empty() {
        rows = document.select(&ROW_FALLBACK_SEL).collect();
    }
    info!(rows = rows.len(), "Found listing rows");

    let mut result = ListingResult::default();
    for row in &rows {
        match extract_row(row, &base) {
            Some(stub) => result.stubs.push(stub),
            None => result.skipped += 1,
        }
    }

    debug!(
        stubs = result.stubs.len(),
        skipped = result.skipped,
        "Listing extraction complete"
    );
    Ok(result)
}

/// Builds a stub from one table row.
///
/// Returns `None` for rows without `td` cells or without a name anchor href.
#[must_use]
pub fn extract_row(row: &ElementRef<'_>, base: &Url) -> Option<PokemonStub> {
    if row.select(&TD_SEL).next().is_none() {
        return None;
    }

    let mut anchors: Vec<ElementRef<'_>> = row.select(&NAME_ANCHOR_SEL).collect();
    if anchors.is_empty() {
        anchors = row.select(&NAME_ANCHOR_FALLBACK_SEL).collect();
    }
    let Some(href) = anchors.iter().find_map(|a| a.value().attr("href")) else {
        debug!("Skipping row without detail link");
        return None;
    };
    let Some(url) = resolve_href(base, href) else {
        debug!(href, "Skipping row with unresolvable detail link");
        return None;
    };
    let name = anchors
        .iter()
        .find_map(own_text)
        .map(|text| text.trim().to_string());

    let row_text = row
        .select(&TD_SEL)
        .map(|td| element_text(&td))
        .collect::<Vec<_>>()
        .join(" ");

    Some(PokemonStub {
        number: dex_number(row),
        name,
        form: detect_form(&row_text),
        slug: to_slug(&url),
        types: row_types(row),
        url,
    })
}

/// Dex number from the numeric cell, the first cell, then any `data-sort`.
fn dex_number(row: &ElementRef<'_>) -> Option<String> {
    first_match_in_own_text(row, &NUM_CELL_SEL)
        .or_else(|| first_match_in_own_text(row, &FIRST_CELL_SEL))
        .or_else(|| {
            row.select(&TD_SEL)
                .filter_map(|td| td.value().attr("data-sort"))
                .find_map(|value| DEX_NUMBER_RE.find(value))
                .map(|m| m.as_str().to_string())
        })
}

fn first_match_in_own_text(row: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector)
        .flat_map(own_text_nodes)
        .find_map(|text| DEX_NUMBER_RE.find(text))
        .map(|m| m.as_str().to_string())
}

fn row_types(row: &ElementRef<'_>) -> Vec<String> {
    let mut raw: Vec<&str> = row.select(&TYPE_ICON_SEL).flat_map(own_text_nodes).collect();
    if raw.is_empty() {
        raw = row
            .select(&TYPE_ICON_FALLBACK_SEL)
            .flat_map(own_text_nodes)
            .collect();
    }
    raw.into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn own_text_nodes<'a>(element: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|text| &**text))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = "https://pokemondb.net/pokedex/all";

    fn table(rows: &str) -> String {
        format!(
            r#"<html><body><table id="pokedex"><thead><tr><th>#</th><th>Name</th><th>Type</th></tr></thead>
            <tbody>{rows}</tbody></table></body></html>"#
        )
    }

    #[test]
    fn test_extract_listing_basic_row() {
        let html = table(
            r#"<tr>
                <td class="cell-num">0001</td>
                <td class="cell-name"><a class="ent-name" href="/pokedex/bulbasaur">Bulbasaur</a></td>
                <td class="cell-icon"><a class="type-icon type-grass" href="/type/grass">Grass</a><br><a class="type-icon type-poison" href="/type/poison">Poison</a></td>
                <td class="cell-num">318</td>
            </tr>"#,
        );
        let result = extract_listing(&html, PAGE).unwrap();
        assert_eq!(result.skipped, 0);
        assert_eq!(result.stubs.len(), 1);
        let stub = &result.stubs[0];
        assert_eq!(stub.number.as_deref(), Some("0001"));
        assert_eq!(stub.name.as_deref(), Some("Bulbasaur"));
        assert_eq!(stub.url, "https://pokemondb.net/pokedex/bulbasaur");
        assert_eq!(stub.slug, "bulbasaur");
        assert_eq!(stub.types, vec!["grass", "poison"]);
        assert_eq!(stub.form, None);
    }

    #[test]
    fn test_extract_listing_detects_mega_form() {
        let html = table(
            r#"<tr>
                <td class="cell-num">0006</td>
                <td class="cell-name"><a class="ent-name" href="/pokedex/charizard">Charizard</a><br><small class="text-muted">Mega Charizard X</small></td>
                <td class="cell-icon"><a class="type-icon" href="/type/fire">Fire</a><a class="type-icon" href="/type/dragon">Dragon</a></td>
            </tr>"#,
        );
        let result = extract_listing(&html, PAGE).unwrap();
        let form = result.stubs[0].form.clone().unwrap();
        assert!(form.contains("Mega Charizard X"), "got {form}");
    }

    #[test]
    fn test_extract_listing_skips_row_without_href() {
        let html = table(
            r#"<tr><td class="cell-num">0001</td><td class="cell-name"><a class="ent-name">Bulbasaur</a></td><td></td></tr>
               <tr><td class="cell-num">0004</td><td class="cell-name"><a class="ent-name" href="/pokedex/charmander">Charmander</a></td><td></td></tr>"#,
        );
        let result = extract_listing(&html, PAGE).unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.stubs.len(), 1);
        assert_eq!(result.stubs[0].name.as_deref(), Some("Charmander"));
    }

    #[test]
    fn test_extract_listing_number_fallbacks() {
        // first-cell text without the cell-num class
        let html = table(
            r#"<tr><td>#0025</td><td><a href="/pokedex/pikachu">Pikachu</a></td><td></td></tr>"#,
        );
        let stub = &extract_listing(&html, PAGE).unwrap().stubs[0];
        assert_eq!(stub.number.as_deref(), Some("0025"));
        assert_eq!(stub.name.as_deref(), Some("Pikachu"));

        // only a data-sort attribute carries the number
        let html = table(
            r#"<tr><td data-sort="133"><span>img</span></td><td><a href="/pokedex/eevee">Eevee</a></td><td></td></tr>"#,
        );
        let stub = &extract_listing(&html, PAGE).unwrap().stubs[0];
        assert_eq!(stub.number.as_deref(), Some("133"));
    }

    #[test]
    fn test_extract_listing_falls_back_to_data_table() {
        let html = r#"<table class="data-table"><tbody>
            <tr><td class="cell-num">0007</td><td class="cell-name"><a class="ent-name" href="/pokedex/squirtle">Squirtle</a></td>
            <td class="cell-icon"><a href="/type/water">Water</a></td></tr>
        </tbody></table>"#;
        let result = extract_listing(html, PAGE).unwrap();
        assert_eq!(result.stubs.len(), 1);
        assert_eq!(result.stubs[0].types, vec!["water"]);
    }

    #[test]
    fn test_extract_listing_skips_rows_without_cells() {
        let html = table(r"<tr></tr>");
        let result = extract_listing(&html, PAGE).unwrap();
        assert!(result.stubs.is_empty());
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn test_extract_listing_rejects_relative_page_url() {
        let err = extract_listing("<table></table>", "/pokedex/all").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPageUrl { .. }));
    }
}
