//! Typed records flowing through the extraction pipeline.
//!
//! Stubs come from listing rows, [`PokemonRecord`]s from detail pages, and
//! [`AbilityRecord`]s from ability pages. Presence/absence of every loosely
//! sourced field is modelled with `Option` rather than implicit nulls.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attacking type -> damage multiplier against a defending type set.
pub type TypeEffectiveness = BTreeMap<String, f64>;

/// Identity of a creature record: dex number plus optional form label.
///
/// A missing form and an empty form compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Zero-padded dex number, if the row had one.
    pub number: Option<String>,
    /// Form label, `""` when the creature has no form.
    pub form: String,
}

impl RecordKey {
    /// Builds a key, folding `None` forms into the empty string.
    #[must_use]
    pub fn new(number: Option<&str>, form: Option<&str>) -> Self {
        Self {
            number: number.map(str::to_string),
            form: form.unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = self.number.as_deref().unwrap_or("?");
        if self.form.is_empty() {
            write!(f, "#{number}")
        } else {
            write!(f, "#{number} ({})", self.form)
        }
    }
}

/// Base record built from one listing row, pending detail-page completion.
#[derive(Debug, Clone, PartialEq)]
pub struct PokemonStub {
    pub number: Option<String>,
    pub name: Option<String>,
    pub form: Option<String>,
    /// Absolute detail-page URL.
    pub url: String,
    /// Lowercase type tokens in listing order.
    pub types: Vec<String>,
    /// Last non-empty path segment of `url`.
    pub slug: String,
}

impl PokemonStub {
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.number.as_deref(), self.form.as_deref())
    }
}

/// Reference to an ability from a creature's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRef {
    pub name: String,
    pub url: String,
}

/// Directed single-hop evolution toward another creature.
///
/// `level` and `item` are independent; both absent means the chart showed no
/// trigger for the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionEdge {
    pub to_number: Option<String>,
    pub to_name: String,
    pub to_url: String,
    pub level: Option<u32>,
    pub item: Option<String>,
}

/// A fully extracted creature record, as emitted to the raw corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonRecord {
    pub number: Option<String>,
    pub name: Option<String>,
    pub form: Option<String>,
    pub url: String,
    pub slug: String,
    pub types: Vec<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub abilities: Vec<AbilityRef>,
    pub next_evolutions: Vec<EvolutionEdge>,
    pub type_effectiveness: TypeEffectiveness,
    pub scraped_from: String,
}

impl PokemonRecord {
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.number.as_deref(), self.form.as_deref())
    }
}

/// Ability page record. Unique by `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRecord {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}
