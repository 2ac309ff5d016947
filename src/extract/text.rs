//! Shared text helpers: unit-aware numbers, slugs, form keywords, selectors.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

/// Form keywords scanned in listing-row text, in priority order.
pub const FORM_KEYWORDS: [&str; 10] = [
    "Mega", "Alolan", "Galarian", "Hisuian", "Partner", "Totem", "Primal", "Therian", "Origin",
    "Paldean",
];

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Parses a CSS selector at static init; panics on invalid selector.
pub fn compile_static_selector(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid static selector '{selector}': {e}"))
}

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

static METERS_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"([0-9]+(?:\.[0-9]+)?)\s*m"));
static KILOGRAMS_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"([0-9]+(?:\.[0-9]+)?)\s*kg"));

static FORM_PHRASE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FORM_KEYWORDS
        .iter()
        .map(|key| compile_static_regex(&format!(r"(?i)({}[^\s,]*\s?[^,]*)", regex::escape(key))))
        .collect()
});

/// Collapses whitespace runs to single spaces and trims the ends.
#[must_use]
pub fn normalize_ws(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Metric suffix of a vitals-table measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Meters,
    Kilograms,
}

impl Unit {
    fn pattern(self) -> &'static Regex {
        match self {
            Self::Meters => &METERS_RE,
            Self::Kilograms => &KILOGRAMS_RE,
        }
    }
}

/// Extracts the number immediately preceding `unit` in `text`.
///
/// `"0.7 m (2′04″)"` with [`Unit::Meters`] yields `0.7`.
#[must_use]
pub fn parse_float_from_text(text: &str, unit: Unit) -> Option<f64> {
    unit.pattern().captures(text)?.get(1)?.as_str().parse().ok()
}

/// Converts meters to centimeters, rounded to one decimal.
#[must_use]
pub fn meters_to_cm(meters: f64) -> f64 {
    (meters * 100.0 * 10.0).round() / 10.0
}

/// Last non-empty path segment of a URL (or URL-like string).
#[must_use]
pub fn to_slug(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Detects a form label in flattened listing-row text.
///
/// The first keyword of [`FORM_KEYWORDS`] found (case-insensitive) wins; the
/// phrase starting at that keyword and running up to the next comma is
/// returned, or the bare keyword if no phrase can be captured.
#[must_use]
pub fn detect_form(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();
    FORM_KEYWORDS
        .iter()
        .zip(FORM_PHRASE_RES.iter())
        .find(|(key, _)| lowered.contains(&key.to_lowercase()))
        .map(|(key, re)| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .map_or_else(|| (*key).to_string(), |m| m.as_str().trim_end().to_string())
        })
}

/// Resolves `href` against `base`, returning the absolute URL string.
#[must_use]
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Concatenated text of an element and its descendants.
#[must_use]
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

/// First direct text child of an element, if any.
#[must_use]
pub fn own_text(element: &ElementRef<'_>) -> Option<String> {
    element
        .children()
        .find_map(|node| node.value().as_text().map(|text| String::from(&**text)))
}

/// First element sibling following `element`.
#[must_use]
pub fn next_element_sibling<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_height_with_imperial_suffix() {
        assert_eq!(parse_float_from_text("0.7 m (2′04″)", Unit::Meters), Some(0.7));
    }

    #[test]
    fn test_parse_float_weight() {
        assert_eq!(parse_float_from_text("6.9 kg (15.2 lbs)", Unit::Kilograms), Some(6.9));
        assert_eq!(parse_float_from_text("6.9 kg", Unit::Kilograms), Some(6.9));
        assert_eq!(parse_float_from_text("100kg", Unit::Kilograms), Some(100.0));
    }

    #[test]
    fn test_parse_float_missing_or_wrong_unit() {
        assert_eq!(parse_float_from_text("", Unit::Meters), None);
        assert_eq!(parse_float_from_text("unknown", Unit::Kilograms), None);
        assert_eq!(parse_float_from_text("15.2 lbs", Unit::Kilograms), None);
    }

    #[test]
    fn test_parse_float_units_do_not_cross() {
        // pounds and feet never satisfy a metric unit
        assert_eq!(parse_float_from_text("(2′04″)", Unit::Meters), None);
        assert_eq!(parse_float_from_text("0.7 m", Unit::Kilograms), None);
        assert_eq!(parse_float_from_text("1.0 m, 2.0 m", Unit::Meters), Some(1.0));
    }

    #[test]
    fn test_meters_to_cm_rounds_to_one_decimal() {
        assert!((meters_to_cm(0.7) - 70.0).abs() < f64::EPSILON);
        assert!((meters_to_cm(1.7) - 170.0).abs() < f64::EPSILON);
        assert!((meters_to_cm(14.5) - 1450.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_slug_ignores_trailing_slash() {
        assert_eq!(to_slug("https://pokemondb.net/pokedex/bulbasaur"), "bulbasaur");
        assert_eq!(to_slug("https://pokemondb.net/pokedex/bulbasaur/"), "bulbasaur");
        assert_eq!(to_slug("/pokedex/mr-mime"), "mr-mime");
    }

    #[test]
    fn test_detect_form_mega_phrase() {
        let form = detect_form("0006 Charizard Mega Charizard X Fire Dragon").unwrap();
        assert!(form.contains("Mega Charizard X"), "got {form}");
        assert!(form.starts_with("Mega"));
    }

    #[test]
    fn test_detect_form_stops_at_comma() {
        assert_eq!(
            detect_form("Alolan Raichu, Electric").as_deref(),
            Some("Alolan Raichu")
        );
    }

    #[test]
    fn test_detect_form_keyword_priority() {
        // "Mega" is checked before "Origin" regardless of position
        let form = detect_form("Origin stuff, Mega Thing").unwrap();
        assert_eq!(form, "Mega Thing");
    }

    #[test]
    fn test_detect_form_none_without_keyword() {
        assert_eq!(detect_form("0001 Bulbasaur Grass Poison 318"), None);
        assert_eq!(detect_form("   "), None);
    }

    #[test]
    fn test_detect_form_case_insensitive() {
        let form = detect_form("0150 mewtwo mega mewtwo y").unwrap();
        assert!(form.starts_with("mega"));
    }

    #[test]
    fn test_normalize_ws() {
        assert_eq!(normalize_ws("  Solar \n  Power "), "Solar Power");
    }

    #[test]
    fn test_resolve_href_relative() {
        let base = Url::parse("https://pokemondb.net/pokedex/all").unwrap();
        assert_eq!(
            resolve_href(&base, "/pokedex/bulbasaur").as_deref(),
            Some("https://pokemondb.net/pokedex/bulbasaur")
        );
    }
}
