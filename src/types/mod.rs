//! Type matchup chart and defensive effectiveness calculator.
//!
//! The chart is static data: attacker -> defender -> multiplier. Pairs not
//! listed are neutral (1.0). [`type_effectiveness`] derives, for a defending
//! type set, the multiplier every attacking type deals against it.

use std::fmt;
use std::str::FromStr;

use tracing::instrument;

use crate::model::TypeEffectiveness;

/// The canonical type universe, declared alphabetically so iteration order
/// matches the serialized key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PokeType {
    Bug,
    Dark,
    Dragon,
    Electric,
    Fairy,
    Fighting,
    Fire,
    Flying,
    Ghost,
    Grass,
    Ground,
    Ice,
    Normal,
    Poison,
    Psychic,
    Rock,
    Steel,
    Water,
}

impl PokeType {
    /// Every attacking type, alphabetical.
    pub const ALL: [PokeType; 18] = [
        Self::Bug,
        Self::Dark,
        Self::Dragon,
        Self::Electric,
        Self::Fairy,
        Self::Fighting,
        Self::Fire,
        Self::Flying,
        Self::Ghost,
        Self::Grass,
        Self::Ground,
        Self::Ice,
        Self::Normal,
        Self::Poison,
        Self::Psychic,
        Self::Rock,
        Self::Steel,
        Self::Water,
    ];

    /// Lowercase token as it appears in records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Dark => "dark",
            Self::Dragon => "dragon",
            Self::Electric => "electric",
            Self::Fairy => "fairy",
            Self::Fighting => "fighting",
            Self::Fire => "fire",
            Self::Flying => "flying",
            Self::Ghost => "ghost",
            Self::Grass => "grass",
            Self::Ground => "ground",
            Self::Ice => "ice",
            Self::Normal => "normal",
            Self::Poison => "poison",
            Self::Psychic => "psychic",
            Self::Rock => "rock",
            Self::Steel => "steel",
            Self::Water => "water",
        }
    }
}

impl fmt::Display for PokeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a token outside the type universe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown type '{0}'")]
pub struct UnknownType(pub String);

impl FromStr for PokeType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == token)
            .ok_or(UnknownType(token))
    }
}

use PokeType::{
    Bug, Dark, Dragon, Electric, Fairy, Fighting, Fire, Flying, Ghost, Grass, Ground, Ice, Normal,
    Poison, Psychic, Rock, Steel, Water,
};

/// Non-neutral matchups, attacker first.
pub static TYPE_CHART: &[(PokeType, &[(PokeType, f64)])] = &[
    (Normal, &[(Rock, 0.5), (Ghost, 0.0), (Steel, 0.5)]),
    (
        Fire,
        &[
            (Fire, 0.5),
            (Water, 0.5),
            (Grass, 2.0),
            (Ice, 2.0),
            (Bug, 2.0),
            (Rock, 0.5),
            (Dragon, 0.5),
            (Steel, 2.0),
        ],
    ),
    (
        Water,
        &[
            (Fire, 2.0),
            (Water, 0.5),
            (Grass, 0.5),
            (Ground, 2.0),
            (Rock, 2.0),
            (Dragon, 0.5),
        ],
    ),
    (
        Electric,
        &[
            (Water, 2.0),
            (Electric, 0.5),
            (Grass, 0.5),
            (Ground, 0.0),
            (Flying, 2.0),
            (Dragon, 0.5),
        ],
    ),
    (
        Grass,
        &[
            (Fire, 0.5),
            (Water, 2.0),
            (Grass, 0.5),
            (Poison, 0.5),
            (Ground, 2.0),
            (Flying, 0.5),
            (Bug, 0.5),
            (Rock, 2.0),
            (Dragon, 0.5),
            (Steel, 0.5),
        ],
    ),
    (
        Ice,
        &[
            (Fire, 0.5),
            (Water, 0.5),
            (Grass, 2.0),
            (Ice, 0.5),
            (Ground, 2.0),
            (Flying, 2.0),
            (Dragon, 2.0),
            (Steel, 0.5),
        ],
    ),
    (
        Fighting,
        &[
            (Normal, 2.0),
            (Ice, 2.0),
            (Poison, 0.5),
            (Flying, 0.5),
            (Psychic, 0.5),
            (Bug, 0.5),
            (Rock, 2.0),
            (Ghost, 0.0),
            (Dark, 2.0),
            (Steel, 2.0),
            (Fairy, 0.5),
        ],
    ),
    (
        Poison,
        &[
            (Grass, 2.0),
            (Poison, 0.5),
            (Ground, 0.5),
            (Rock, 0.5),
            (Ghost, 0.5),
            (Steel, 0.0),
            (Fairy, 2.0),
        ],
    ),
    (
        Ground,
        &[
            (Fire, 2.0),
            (Electric, 2.0),
            (Grass, 0.5),
            (Poison, 2.0),
            (Flying, 0.0),
            (Bug, 0.5),
            (Rock, 2.0),
            (Steel, 2.0),
        ],
    ),
    (
        Flying,
        &[
            (Electric, 0.5),
            (Grass, 2.0),
            (Fighting, 2.0),
            (Bug, 2.0),
            (Rock, 0.5),
            (Steel, 0.5),
        ],
    ),
    (
        Psychic,
        &[
            (Fighting, 2.0),
            (Poison, 2.0),
            (Psychic, 0.5),
            (Dark, 0.0),
            (Steel, 0.5),
        ],
    ),
    (
        Bug,
        &[
            (Fire, 0.5),
            (Grass, 2.0),
            (Fighting, 0.5),
            (Poison, 0.5),
            (Flying, 0.5),
            (Psychic, 2.0),
            (Ghost, 0.5),
            (Dark, 2.0),
            (Steel, 0.5),
            (Fairy, 0.5),
        ],
    ),
    (
        Rock,
        &[
            (Fire, 2.0),
            (Ice, 2.0),
            (Flying, 2.0),
            (Bug, 2.0),
            (Fighting, 0.5),
            (Ground, 0.5),
            (Steel, 0.5),
        ],
    ),
    (
        Ghost,
        &[(Normal, 0.0), (Psychic, 2.0), (Ghost, 2.0), (Dark, 0.5)],
    ),
    (Dragon, &[(Dragon, 2.0), (Steel, 0.5), (Fairy, 0.0)]),
    (
        Dark,
        &[
            (Fighting, 0.5),
            (Psychic, 2.0),
            (Ghost, 2.0),
            (Dark, 0.5),
            (Fairy, 0.5),
        ],
    ),
    (
        Steel,
        &[
            (Fire, 0.5),
            (Water, 0.5),
            (Electric, 0.5),
            (Ice, 2.0),
            (Rock, 2.0),
            (Fairy, 2.0),
            (Steel, 0.5),
        ],
    ),
    (
        Fairy,
        &[
            (Fire, 0.5),
            (Fighting, 2.0),
            (Poison, 0.5),
            (Dragon, 2.0),
            (Dark, 2.0),
            (Steel, 0.5),
        ],
    ),
];

/// Chart entry for one attacker/defender pair, 1.0 when unlisted.
#[must_use]
pub fn matchup(attacker: PokeType, defender: PokeType) -> f64 {
    TYPE_CHART
        .iter()
        .find(|(a, _)| *a == attacker)
        .and_then(|(_, row)| row.iter().find(|(d, _)| *d == defender))
        .map_or(1.0, |(_, multiplier)| *multiplier)
}

/// Computes the multiplier every attacking type deals to `defending`.
///
/// Defending tokens are matched case-insensitively; tokens outside the type
/// universe contribute a neutral 1.0. Results are rounded to two decimals
/// and every attacking type is present in the output.
#[must_use]
#[instrument(level = "trace", skip(defending), fields(defending = defending.len()))]
pub fn type_effectiveness<S: AsRef<str>>(defending: &[S]) -> TypeEffectiveness {
    let defenders: Vec<Option<PokeType>> = defending
        .iter()
        .map(|t| t.as_ref().parse::<PokeType>().ok())
        .collect();

    PokeType::ALL
        .into_iter()
        .map(|attacker| {
            let product: f64 = defenders
                .iter()
                .map(|d| d.map_or(1.0, |defender| matchup(attacker, defender)))
                .product();
            (attacker.as_str().to_string(), round2(product))
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
