//! Persistence sink for cleaned records, plus the derived queries.
//!
//! Creatures are upserted by `(number, form)`, abilities by `url`. A creature
//! upsert replaces the row together with its type and evolution rows in one
//! transaction.

use std::path::Path;

use sqlx::Row;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::clean::{CleanAbility, CleanPokemon};
use crate::db::Database;
use crate::jsonl::{ABILITIES_CLEAN, JsonlError, POKEMONS_CLEAN, read_jsonl};

/// Errors from the persistence sink.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode column {column}: {source}")]
    Encode {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read clean stream: {0}")]
    Input(#[from] JsonlError),
}

impl StoreError {
    fn encode(column: &'static str, source: serde_json::Error) -> Self {
        Self::Encode { column, source }
    }
}

/// A creature returned by the derived queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokemonSummary {
    pub number: String,
    pub form: String,
    pub name: String,
    pub types: Vec<String>,
}

/// Counts from loading the clean streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub pokemons: usize,
    pub abilities: usize,
    /// Lines of the clean streams that failed to parse
    pub malformed: usize,
    /// Rows the database rejected; the rest of the stream still loads
    pub failed: usize,
}

/// Repository over a [`Database`].
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
}

impl Store {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts or replaces the creature keyed by `(number, form)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if encoding or any statement fails; the
    /// transaction is rolled back in that case.
    #[instrument(skip(self, pokemon), fields(number = %pokemon.number, form = %pokemon.form))]
    pub async fn upsert_pokemon(&self, pokemon: &CleanPokemon) -> Result<(), StoreError> {
        let types_json =
            serde_json::to_string(&pokemon.types).map_err(|e| StoreError::encode("types", e))?;
        let abilities_json = serde_json::to_string(pokemon.abilities.as_deref().unwrap_or_default())
            .map_err(|e| StoreError::encode("abilities", e))?;
        let effectiveness_json = pokemon
            .type_effectiveness
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::encode("type_effectiveness", e))?;
        let type_count = i64::try_from(pokemon.types.len()).unwrap_or(i64::MAX);

        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r"INSERT INTO pokemon (
                number, form, name, slug, url, types, type_count,
                height_cm, weight_kg, abilities, type_effectiveness, scraped_from
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT (number, form) DO UPDATE SET
                name = excluded.name,
                slug = excluded.slug,
                url = excluded.url,
                types = excluded.types,
                type_count = excluded.type_count,
                height_cm = excluded.height_cm,
                weight_kg = excluded.weight_kg,
                abilities = excluded.abilities,
                type_effectiveness = excluded.type_effectiveness,
                scraped_from = excluded.scraped_from,
                updated_at = datetime('now')",
        )
        .bind(&pokemon.number)
        .bind(&pokemon.form)
        .bind(&pokemon.name)
        .bind(pokemon.slug.as_deref())
        .bind(pokemon.url.as_deref())
        .bind(types_json)
        .bind(type_count)
        .bind(pokemon.height_cm)
        .bind(pokemon.weight_kg)
        .bind(abilities_json)
        .bind(effectiveness_json)
        .bind(pokemon.scraped_from.as_deref())
        .execute(&mut *tx)
        .await?;

        for table in ["pokemon_type", "evolution"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE number = ? AND form = ?"))
                .bind(&pokemon.number)
                .bind(&pokemon.form)
                .execute(&mut *tx)
                .await?;
        }

        for (position, type_name) in (0_i64..).zip(&pokemon.types) {
            sqlx::query(
                r"INSERT INTO pokemon_type (number, form, position, type) VALUES (?, ?, ?, ?)",
            )
            .bind(&pokemon.number)
            .bind(&pokemon.form)
            .bind(position)
            .bind(type_name)
            .execute(&mut *tx)
            .await?;
        }

        let edges = pokemon.next_evolutions.as_deref().unwrap_or_default();
        for (position, edge) in (0_i64..).zip(edges) {
            sqlx::query(
                r"INSERT INTO evolution (number, form, position, to_number, to_name, to_url, level, item)
                  VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&pokemon.number)
            .bind(&pokemon.form)
            .bind(position)
            .bind(edge.to_number.as_deref())
            .bind(&edge.to_name)
            .bind(&edge.to_url)
            .bind(edge.level.map(i64::from))
            .bind(edge.item.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(edges = edges.len(), "upserted pokemon");
        Ok(())
    }

    /// Inserts or replaces the ability keyed by `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the statement fails.
    #[instrument(skip(self, ability), fields(url = %ability.url))]
    pub async fn upsert_ability(&self, ability: &CleanAbility) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO ability (url, name, effect) VALUES (?, ?, ?)
              ON CONFLICT (url) DO UPDATE SET
                name = excluded.name,
                effect = excluded.effect,
                updated_at = datetime('now')",
        )
        .bind(&ability.url)
        .bind(&ability.name)
        .bind(ability.effect.as_deref())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Number of stored creatures.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count_pokemon(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM pokemon")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.get("n"))
    }

    /// Number of stored abilities.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count_abilities(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM ability")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.get("n"))
    }

    /// Number of creatures with two or more types.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_multi_type(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM pokemon WHERE type_count >= 2")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.get("n"))
    }

    /// Creatures of `type_name` whose number is the target of an evolution
    /// edge with a level strictly above `min_level`, ordered by number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn evolutions_of_type_above_level(
        &self,
        type_name: &str,
        min_level: u32,
    ) -> Result<Vec<PokemonSummary>, StoreError> {
        let rows = sqlx::query(
            r"SELECT p.number, p.form, p.name, p.types
              FROM pokemon p
              WHERE EXISTS (
                  SELECT 1 FROM pokemon_type t
                  WHERE t.number = p.number AND t.form = p.form AND t.type = ?
              )
              AND p.number IN (
                  SELECT to_number FROM evolution
                  WHERE to_number IS NOT NULL AND level > ?
              )
              ORDER BY p.number, p.form",
        )
        .bind(type_name.trim().to_lowercase())
        .bind(i64::from(min_level))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let types: String = row.get("types");
                PokemonSummary {
                    number: row.get("number"),
                    form: row.get("form"),
                    name: row.get("name"),
                    types: serde_json::from_str(&types).unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Upserts every row of the clean streams in `data_dir`.
    ///
    /// A missing ability stream is skipped; the creature stream is required.
    /// A row whose upsert fails is logged and counted in
    /// [`LoadReport::failed`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a stream cannot be read.
    #[instrument(skip(self), fields(data_dir = %data_dir.display()))]
    pub async fn load_clean_dir(&self, data_dir: &Path) -> Result<LoadReport, StoreError> {
        let mut report = LoadReport::default();

        let pokemons = read_jsonl::<CleanPokemon>(&data_dir.join(POKEMONS_CLEAN))?;
        report.malformed += pokemons.malformed;
        for pokemon in &pokemons.rows {
            match self.upsert_pokemon(pokemon).await {
                Ok(()) => report.pokemons += 1,
                Err(e) => {
                    warn!(
                        number = %pokemon.number,
                        form = %pokemon.form,
                        error = %e,
                        "skipping row"
                    );
                    report.failed += 1;
                }
            }
        }

        let abilities_path = data_dir.join(ABILITIES_CLEAN);
        if abilities_path.exists() {
            let abilities = read_jsonl::<CleanAbility>(&abilities_path)?;
            report.malformed += abilities.malformed;
            for ability in &abilities.rows {
                match self.upsert_ability(ability).await {
                    Ok(()) => report.abilities += 1,
                    Err(e) => {
                        warn!(url = %ability.url, error = %e, "skipping ability");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            pokemons = report.pokemons,
            abilities = report.abilities,
            malformed = report.malformed,
            failed = report.failed,
            "loaded clean streams"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::EvolutionEdge;

    fn pokemon(number: &str, name: &str, types: &[&str]) -> CleanPokemon {
        CleanPokemon {
            number: number.to_string(),
            name: name.to_string(),
            form: String::new(),
            url: None,
            slug: None,
            types: types.iter().map(|t| (*t).to_string()).collect(),
            height_cm: None,
            weight_kg: None,
            abilities: None,
            next_evolutions: None,
            type_effectiveness: None,
            scraped_from: None,
        }
    }

    fn edge(to_number: &str, level: Option<u32>) -> EvolutionEdge {
        EvolutionEdge {
            to_number: Some(to_number.to_string()),
            to_name: format!("#{to_number}"),
            to_url: format!("https://pokemondb.net/pokedex/{to_number}"),
            level,
            item: None,
        }
    }

    async fn store() -> Store {
        Store::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_pokemon_replaces_row_and_edges() {
        let store = store().await;
        let mut squirtle = pokemon("0007", "Squirtle", &["water"]);
        squirtle.next_evolutions = Some(vec![edge("0008", Some(16)), edge("0009", Some(16))]);
        store.upsert_pokemon(&squirtle).await.unwrap();

        squirtle.name = "Squirtle!".to_string();
        squirtle.next_evolutions = Some(vec![edge("0008", Some(16))]);
        store.upsert_pokemon(&squirtle).await.unwrap();

        assert_eq!(store.count_pokemon().await.unwrap(), 1);
        let edges: i64 = sqlx::query("SELECT COUNT(*) AS n FROM evolution")
            .fetch_one(store.db.pool())
            .await
            .unwrap()
            .get("n");
        assert_eq!(edges, 1);
        let name: String = sqlx::query("SELECT name FROM pokemon WHERE number = '0007'")
            .fetch_one(store.db.pool())
            .await
            .unwrap()
            .get("name");
        assert_eq!(name, "Squirtle!");
    }

    #[tokio::test]
    async fn test_upsert_ability_is_keyed_by_url() {
        let store = store().await;
        let mut ability = CleanAbility {
            name: "Torrent".to_string(),
            url: "https://pokemondb.net/ability/torrent".to_string(),
            effect: None,
        };
        store.upsert_ability(&ability).await.unwrap();
        ability.effect = Some("Powers up Water-type moves.".to_string());
        store.upsert_ability(&ability).await.unwrap();
        assert_eq!(store.count_abilities().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_multi_type() {
        let store = store().await;
        store.upsert_pokemon(&pokemon("0001", "Bulbasaur", &["grass", "poison"])).await.unwrap();
        store.upsert_pokemon(&pokemon("0004", "Charmander", &["fire"])).await.unwrap();
        store.upsert_pokemon(&pokemon("0006", "Charizard", &["fire", "flying"])).await.unwrap();
        assert_eq!(store.count_multi_type().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_evolutions_of_type_above_level() {
        let store = store().await;
        let mut squirtle = pokemon("0007", "Squirtle", &["water"]);
        squirtle.next_evolutions = Some(vec![edge("0008", Some(16))]);
        let mut wartortle = pokemon("0008", "Wartortle", &["water"]);
        wartortle.next_evolutions = Some(vec![edge("0009", Some(36))]);
        let blastoise = pokemon("0009", "Blastoise", &["water"]);
        let mut charmeleon = pokemon("0005", "Charmeleon", &["fire"]);
        charmeleon.next_evolutions = Some(vec![edge("0006", Some(36))]);
        let charizard = pokemon("0006", "Charizard", &["fire", "flying"]);

        for p in [&squirtle, &wartortle, &blastoise, &charmeleon, &charizard] {
            store.upsert_pokemon(p).await.unwrap();
        }

        let water = store.evolutions_of_type_above_level("water", 30).await.unwrap();
        assert_eq!(water.len(), 1);
        assert_eq!(water[0].name, "Blastoise");
        assert_eq!(water[0].types, vec!["water"]);

        let low = store.evolutions_of_type_above_level("Water", 10).await.unwrap();
        let names: Vec<&str> = low.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Wartortle", "Blastoise"]);

        assert!(store.evolutions_of_type_above_level("water", 36).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_clean_dir_skips_rejected_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bulbasaur = pokemon("0001", "Bulbasaur", &["grass", "poison"]);
        bulbasaur.next_evolutions = Some(vec![edge("0002", Some(0))]);
        let ivysaur = pokemon("0002", "Ivysaur", &["grass", "poison"]);
        let lines: String = [&bulbasaur, &ivysaur]
            .iter()
            .map(|p| format!("{}\n", serde_json::to_string(p).unwrap()))
            .collect();
        std::fs::write(dir.path().join(POKEMONS_CLEAN), lines).unwrap();

        let store = store().await;
        let report = store.load_clean_dir(dir.path()).await.unwrap();
        assert_eq!(report.pokemons, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(store.count_pokemon().await.unwrap(), 1);
        // the rejected row leaves no partial edges behind
        let edges: i64 = sqlx::query("SELECT COUNT(*) AS n FROM evolution")
            .fetch_one(store.db.pool())
            .await
            .unwrap()
            .get("n");
        assert_eq!(edges, 0);
    }
}
