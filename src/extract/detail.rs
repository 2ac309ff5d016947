//! Detail page extraction: completes a listing stub into a [`PokemonRecord`].

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::ExtractError;
use super::evolution::resolve_next_evolutions;
use super::text::{
    Unit, compile_static_selector, element_text, meters_to_cm, normalize_ws, own_text,
    parse_float_from_text, resolve_href,
};
use crate::model::{AbilityRef, PokemonRecord, PokemonStub};
use crate::types::type_effectiveness;

static TH_SEL: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("th"));
static ABILITY_LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| compile_static_selector(r#"a[href*="/ability/"]"#));

/// Completes `stub` from its detail document.
///
/// Missing measurements, abilities, or evolution chart leave the matching
/// field empty. A failing evolution lookup is logged and replaced by an empty
/// edge list.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidPageUrl`] if `page_url` is not absolute.
#[instrument(skip(html, stub), fields(slug = %stub.slug))]
pub fn extract_detail(
    html: &str,
    page_url: &str,
    stub: &PokemonStub,
) -> Result<PokemonRecord, ExtractError> {
    let base = Url::parse(page_url).map_err(|e| ExtractError::invalid_page_url(page_url, &e))?;
    let document = Html::parse_document(html);

    let height_cm = header_cell_text(&document, "Height")
        .and_then(|text| parse_float_from_text(&text, Unit::Meters))
        .map(meters_to_cm);
    let weight_kg = header_cell_text(&document, "Weight")
        .and_then(|text| parse_float_from_text(&text, Unit::Kilograms));
    let abilities = abilities(&document, &base);

    let next_evolutions = resolve_next_evolutions(&document, &base).unwrap_or_else(|e| {
        warn!(error = %e, "Evolution lookup failed; recording no edges");
        Vec::new()
    });

    debug!(
        ?height_cm,
        ?weight_kg,
        abilities = abilities.len(),
        evolutions = next_evolutions.len(),
        "Extracted detail page"
    );

    Ok(PokemonRecord {
        number: stub.number.clone(),
        name: stub.name.clone(),
        form: stub.form.clone(),
        url: stub.url.clone(),
        slug: stub.slug.clone(),
        type_effectiveness: type_effectiveness(&stub.types),
        types: stub.types.clone(),
        height_cm,
        weight_kg,
        abilities,
        next_evolutions,
        scraped_from: page_url.to_string(),
    })
}

/// Own text of the `td` that follows the first `th` containing `label`.
fn header_cell_text(document: &Html, label: &str) -> Option<String> {
    let th = document
        .select(&TH_SEL)
        .find(|th| element_text(th).contains(label))?;
    let td = following_cell(&th)?;
    own_text(&td).or_else(|| Some(element_text(&td)))
}

fn following_cell<'a>(th: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    th.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")
}

/// Ability links under every "Abilities" header, in document order.
///
/// Duplicates are kept.
fn abilities(document: &Html, base: &Url) -> Vec<AbilityRef> {
    document
        .select(&TH_SEL)
        .filter(|th| element_text(th).contains("Abilities"))
        .filter_map(|th| following_cell(&th))
        .flat_map(|td| td.select(&ABILITY_LINK_SEL).collect::<Vec<_>>())
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let Some(url) = resolve_href(base, href) else {
                debug!(href, "Skipping unresolvable ability link");
                return None;
            };
            Some(AbilityRef {
                name: normalize_ws(&element_text(&anchor)),
                url,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stub() -> PokemonStub {
        PokemonStub {
            number: Some("0001".to_string()),
            name: Some("Bulbasaur".to_string()),
            form: None,
            url: "https://pokemondb.net/pokedex/bulbasaur".to_string(),
            types: vec!["grass".to_string(), "poison".to_string()],
            slug: "bulbasaur".to_string(),
        }
    }

    const PAGE: &str = r#"<html><body><h1>Bulbasaur</h1>
        <table class="vitals-table"><tbody>
          <tr><th>National №</th><td><strong>0001</strong></td></tr>
          <tr><th>Height</th><td>0.7&nbsp;m (2′04″)</td></tr>
          <tr><th>Weight</th><td>6.9&nbsp;kg (15.2&nbsp;lbs)</td></tr>
          <tr><th>Abilities</th><td><span>1. <a href="/ability/overgrow">Overgrow</a></span><br>
              <small><a href="/ability/chlorophyll">Chlorophyll  </a> (hidden ability)</small></td></tr>
        </tbody></table></body></html>"#;

    #[test]
    fn test_extract_detail_measurements_and_abilities() {
        let record = extract_detail(PAGE, "https://pokemondb.net/pokedex/bulbasaur", &stub()).unwrap();
        assert_eq!(record.height_cm, Some(70.0));
        assert_eq!(record.weight_kg, Some(6.9));
        assert_eq!(record.abilities.len(), 2);
        assert_eq!(record.abilities[0].name, "Overgrow");
        assert_eq!(record.abilities[0].url, "https://pokemondb.net/ability/overgrow");
        assert_eq!(record.abilities[1].name, "Chlorophyll");
        assert_eq!(record.scraped_from, "https://pokemondb.net/pokedex/bulbasaur");
        assert!(record.next_evolutions.is_empty());
        assert_eq!(record.type_effectiveness.len(), 18);
        assert_eq!(record.type_effectiveness["fire"], 2.0);
    }

    #[test]
    fn test_extract_detail_degrades_on_empty_document() {
        let record = extract_detail("<html></html>", "https://pokemondb.net/pokedex/bulbasaur", &stub()).unwrap();
        assert_eq!(record.height_cm, None);
        assert_eq!(record.weight_kg, None);
        assert!(record.abilities.is_empty());
        assert_eq!(record.number.as_deref(), Some("0001"));
        assert_eq!(record.types, vec!["grass", "poison"]);
    }

    #[test]
    fn test_extract_detail_keeps_duplicate_abilities() {
        let html = r#"<table>
            <tr><th>Abilities</th><td><a href="/ability/static">Static</a></td></tr>
            <tr><th>Local Abilities</th><td><a href="/ability/static">Static</a></td></tr>
        </table>"#;
        let record = extract_detail(html, "https://pokemondb.net/pokedex/pikachu", &stub()).unwrap();
        assert_eq!(record.abilities.len(), 2);
    }

    #[test]
    fn test_extract_detail_unparseable_height() {
        let html = r"<table><tr><th>Height</th><td>unknown</td></tr></table>";
        let record = extract_detail(html, "https://pokemondb.net/pokedex/x", &stub()).unwrap();
        assert_eq!(record.height_cm, None);
    }
}
