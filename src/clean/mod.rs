//! Batch normalization of the raw corpus.
//!
//! Runs after extraction over the complete raw creature and ability streams.
//! Raw rows are read leniently: identity fields may be strings or numbers,
//! measurements may be numbers, numeric strings, or junk, and `types` may be a
//! list, a scalar, or null. Nested abilities, edges and multipliers are
//! coerced item by item, so a malformed item is dropped without losing its
//! row. The cleaner re-types and nulls fields but never re-parses documents.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::jsonl::{
    ABILITIES_CLEAN, ABILITIES_RAW, JsonlError, JsonlRead, POKEMONS_CLEAN, POKEMONS_RAW,
    read_jsonl, write_jsonl,
};
use crate::model::{AbilityRef, EvolutionEdge, TypeEffectiveness};

/// Largest plausible height, in centimeters.
pub const MAX_HEIGHT_CM: f64 = 2000.0;
/// Largest plausible weight, in kilograms.
pub const MAX_WEIGHT_KG: f64 = 10000.0;

/// Errors produced by the file-level cleaning pass.
#[derive(Debug, Error)]
pub enum CleanError {
    /// Reading a raw stream or writing a clean stream failed.
    #[error("{stream} stream: {source}")]
    Jsonl {
        stream: &'static str,
        #[source]
        source: JsonlError,
    },
}

impl CleanError {
    fn jsonl(stream: &'static str, source: JsonlError) -> Self {
        Self::Jsonl { stream, source }
    }
}

/// A creature row as found in the raw stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPokemonRow {
    #[serde(default)]
    pub number: Value,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub form: Value,
    #[serde(default)]
    pub url: Value,
    #[serde(default)]
    pub slug: Value,
    #[serde(default)]
    pub types: Value,
    #[serde(default)]
    pub height_cm: Value,
    #[serde(default)]
    pub weight_kg: Value,
    #[serde(default)]
    pub abilities: Value,
    #[serde(default)]
    pub next_evolutions: Value,
    #[serde(default)]
    pub type_effectiveness: Value,
    #[serde(default)]
    pub scraped_from: Value,
}

/// A normalized creature row. Absent optional fields are not serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanPokemon {
    pub number: String,
    pub name: String,
    /// `""` when the creature has no form
    #[serde(default)]
    pub form: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abilities: Option<Vec<AbilityRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_evolutions: Option<Vec<EvolutionEdge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_effectiveness: Option<TypeEffectiveness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_from: Option<String>,
}

/// An ability row as found in the raw stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAbilityRow {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub url: Value,
    #[serde(default)]
    pub effect: Value,
}

/// A normalized ability row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanAbility {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

/// Counters describing one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub pokemons_in: usize,
    pub pokemons_out: usize,
    /// Raw lines (both streams) that were not valid rows
    pub unparseable_lines: usize,
    pub missing_identity: usize,
    pub duplicates_removed: usize,
    pub heights_nulled: usize,
    pub weights_nulled: usize,
    pub abilities_in: usize,
    pub abilities_out: usize,
    pub abilities_dropped: usize,
    pub ability_duplicates_removed: usize,
    /// Malformed ability refs, edges or multipliers removed from kept rows
    pub nested_items_dropped: usize,
}

/// Cleans creature rows.
///
/// Rows without a number or name are dropped. The rest are coerced, sorted by
/// `(number, form, name)`, reduced to the first row per `(number, form)`, and
/// have out-of-range measurements nulled.
#[must_use]
pub fn clean_pokemons(rows: Vec<RawPokemonRow>, report: &mut CleanReport) -> Vec<CleanPokemon> {
    report.pokemons_in += rows.len();

    let mut cleaned: Vec<CleanPokemon> = rows
        .into_iter()
        .filter_map(|row| {
            let cleaned = coerce_row(row, report);
            if cleaned.is_none() {
                report.missing_identity += 1;
            }
            cleaned
        })
        .collect();

    cleaned.sort_by(sort_key_cmp);

    let mut seen = HashSet::new();
    let before = cleaned.len();
    cleaned.retain(|row| seen.insert((row.number.clone(), row.form.clone())));
    report.duplicates_removed += before - cleaned.len();

    for row in &mut cleaned {
        if row.height_cm.is_some_and(|h| h <= 0.0 || h > MAX_HEIGHT_CM) {
            row.height_cm = None;
            report.heights_nulled += 1;
        }
        if row.weight_kg.is_some_and(|w| w <= 0.0 || w > MAX_WEIGHT_KG) {
            row.weight_kg = None;
            report.weights_nulled += 1;
        }
    }

    report.pokemons_out += cleaned.len();
    cleaned
}

fn sort_key_cmp(a: &CleanPokemon, b: &CleanPokemon) -> Ordering {
    (&a.number, &a.form, &a.name).cmp(&(&b.number, &b.form, &b.name))
}

fn coerce_row(row: RawPokemonRow, report: &mut CleanReport) -> Option<CleanPokemon> {
    let number = value_to_identity(&row.number)?;
    let name = value_to_identity(&row.name)?;
    Some(CleanPokemon {
        number,
        name,
        form: value_to_identity(&row.form).unwrap_or_default(),
        url: value_to_text(&row.url),
        slug: value_to_text(&row.slug),
        types: normalize_types(&row.types),
        height_cm: coerce_number(&row.height_cm),
        weight_kg: coerce_number(&row.weight_kg),
        abilities: coerce_list(&row.abilities, coerce_ability_ref, report),
        next_evolutions: coerce_list(&row.next_evolutions, coerce_edge, report),
        type_effectiveness: coerce_effectiveness(&row.type_effectiveness, report),
        scraped_from: value_to_text(&row.scraped_from),
    })
}

/// Coerces every item of a JSON array, dropping the ones `item` rejects.
/// A non-array value is absent.
fn coerce_list<T>(
    value: &Value,
    item: fn(&Value) -> Option<T>,
    report: &mut CleanReport,
) -> Option<Vec<T>> {
    let Value::Array(items) = value else {
        if !value.is_null() {
            report.nested_items_dropped += 1;
        }
        return None;
    };
    let kept: Vec<T> = items.iter().filter_map(item).collect();
    report.nested_items_dropped += items.len() - kept.len();
    Some(kept)
}

fn coerce_ability_ref(value: &Value) -> Option<AbilityRef> {
    Some(AbilityRef {
        name: value_to_identity(value.get("name")?)?,
        url: value_to_text(value.get("url")?)?,
    })
}

fn coerce_edge(value: &Value) -> Option<EvolutionEdge> {
    let field = |key: &str| value.get(key).unwrap_or(&Value::Null);
    Some(EvolutionEdge {
        to_number: value_to_identity(field("to_number")),
        to_name: value_to_identity(field("to_name"))?,
        to_url: value_to_text(field("to_url"))?,
        level: coerce_level(field("level")),
        item: value_to_identity(field("item")),
    })
}

/// Positive whole level; `16.0` and `"16"` are accepted, `0` and `1.5` are not.
fn coerce_level(value: &Value) -> Option<u32> {
    let level = coerce_number(value)?;
    if level < 1.0 || level.fract() != 0.0 || level > f64::from(u32::MAX) {
        return None;
    }
    // Whole and within u32 range, checked above.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(level as u32)
}

fn coerce_effectiveness(value: &Value, report: &mut CleanReport) -> Option<TypeEffectiveness> {
    let Value::Object(entries) = value else {
        if !value.is_null() {
            report.nested_items_dropped += 1;
        }
        return None;
    };
    let kept: BTreeMap<String, f64> = entries
        .iter()
        .filter_map(|(attacker, multiplier)| {
            coerce_number(multiplier)
                .filter(|m| *m >= 0.0)
                .map(|m| (attacker.clone(), m))
        })
        .collect();
    report.nested_items_dropped += entries.len() - kept.len();
    Some(kept)
}

/// Non-empty string, kept verbatim.
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Non-blank string (or number rendered as string).
fn value_to_identity(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Numeric value of a JSON number or numeric string; anything else is absent.
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Lowercase, trimmed, non-empty type tokens.
#[must_use]
pub fn normalize_types(value: &Value) -> Vec<String> {
    let token = |v: &Value| -> Option<String> {
        let text = match v {
            Value::String(s) => s.trim().to_lowercase(),
            Value::Null => return None,
            other => other.to_string().trim().to_lowercase(),
        };
        (!text.is_empty()).then_some(text)
    };
    match value {
        Value::Array(items) => items.iter().filter_map(token).collect(),
        Value::Null => Vec::new(),
        scalar => token(scalar).into_iter().collect(),
    }
}

/// Drops ability rows without a name or url and keeps the first row per url.
#[must_use]
pub fn clean_abilities(rows: Vec<RawAbilityRow>, report: &mut CleanReport) -> Vec<CleanAbility> {
    report.abilities_in += rows.len();
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();

    for row in rows {
        let (Some(name), Some(url)) = (value_to_identity(&row.name), value_to_text(&row.url))
        else {
            report.abilities_dropped += 1;
            continue;
        };
        if !seen.insert(url.clone()) {
            report.ability_duplicates_removed += 1;
            continue;
        }
        cleaned.push(CleanAbility {
            name,
            url,
            effect: match row.effect {
                Value::String(effect) => Some(effect.trim().to_string()),
                _ => None,
            },
        });
    }

    report.abilities_out += cleaned.len();
    cleaned
}

/// Cleans the raw streams in `input_dir` and writes the clean streams to
/// `output_dir`.
///
/// A missing raw stream is treated as empty.
///
/// # Errors
///
/// Returns [`CleanError`] if a stream cannot be read or written.
#[instrument(fields(input = %input_dir.display(), output = %output_dir.display()))]
pub fn clean_data_dir(input_dir: &Path, output_dir: &Path) -> Result<CleanReport, CleanError> {
    let mut report = CleanReport::default();

    let pokemons: JsonlRead<RawPokemonRow> = read_optional(&input_dir.join(POKEMONS_RAW))
        .map_err(|e| CleanError::jsonl("pokemons", e))?;
    let abilities: JsonlRead<RawAbilityRow> = read_optional(&input_dir.join(ABILITIES_RAW))
        .map_err(|e| CleanError::jsonl("abilities", e))?;
    report.unparseable_lines = pokemons.malformed + abilities.malformed;

    let clean_pokemon_rows = clean_pokemons(pokemons.rows, &mut report);
    let clean_ability_rows = clean_abilities(abilities.rows, &mut report);

    write_jsonl(&output_dir.join(POKEMONS_CLEAN), &clean_pokemon_rows)
        .map_err(|e| CleanError::jsonl("pokemons", e))?;
    write_jsonl(&output_dir.join(ABILITIES_CLEAN), &clean_ability_rows)
        .map_err(|e| CleanError::jsonl("abilities", e))?;

    info!(
        pokemons = report.pokemons_out,
        abilities = report.abilities_out,
        duplicates = report.duplicates_removed,
        dropped = report.missing_identity,
        nested_dropped = report.nested_items_dropped,
        "Cleaning complete"
    );
    Ok(report)
}

fn read_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<JsonlRead<T>, JsonlError> {
    if !path.exists() {
        warn!(path = %path.display(), "Raw stream missing; treating as empty");
        return Ok(JsonlRead {
            rows: Vec::new(),
            malformed: 0,
        });
    }
    read_jsonl(path)
}
