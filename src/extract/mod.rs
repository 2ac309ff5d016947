//! Document extraction: listing rows, detail pages, evolution charts, abilities.
//!
//! Every function here works on a single already-fetched document and holds
//! no state between calls, so documents can be extracted concurrently.
//! Deviations from the expected markup degrade to empty fields; the only
//! error surfaced is an unusable page URL.
//!
//! # Example
//!
//! ```
//! use pokedex_core::extract::extract_listing;
//!
//! let html = r#"<table id="pokedex"><tbody><tr>
//!   <td class="cell-num">0007</td>
//!   <td class="cell-name"><a class="ent-name" href="/pokedex/squirtle">Squirtle</a></td>
//!   <td class="cell-icon"><a class="type-icon">Water</a></td>
//! </tr></tbody></table>"#;
//! let result = extract_listing(html, "https://pokemondb.net/pokedex/all").unwrap();
//! assert_eq!(result.stubs[0].slug, "squirtle");
//! ```

mod ability;
mod detail;
mod error;
mod evolution;
mod listing;
mod text;

pub use ability::{extract_ability, extract_ability_links};
pub use detail::extract_detail;
pub use error::ExtractError;
pub use evolution::{
    EvolutionCard, TRIGGER_WINDOW, Trigger, emit_edges, nearest_trigger, parse_trigger,
    resolve_next_evolutions,
};
pub use listing::{ListingResult, extract_listing, extract_row};
pub use text::{
    FORM_KEYWORDS, Unit, detect_form, meters_to_cm, normalize_ws, parse_float_from_text, to_slug,
};
