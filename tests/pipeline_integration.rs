//! Raw stream -> clean stream -> SQLite, through the public library API.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use pokedex_core::clean::CleanAbility;
use pokedex_core::jsonl::{
    ABILITIES_CLEAN, ABILITIES_RAW, POKEMONS_CLEAN, POKEMONS_RAW, read_jsonl,
};
use pokedex_core::{CleanPokemon, Database, Store, clean_data_dir};
use serde_json::{Value, json};
use tempfile::TempDir;

fn write_lines(path: &Path, lines: &[Value]) {
    let text: String = lines.iter().map(|line| format!("{line}\n")).collect();
    fs::write(path, text).unwrap();
}

fn edge(to_number: &str, to_name: &str, level: Option<u32>, item: Option<&str>) -> Value {
    json!({
        "to_number": to_number,
        "to_name": to_name,
        "to_url": format!("https://pokemondb.net/pokedex/{}", to_name.to_lowercase()),
        "level": level,
        "item": item,
    })
}

fn seed_raw(dir: &Path) {
    let pokemons = vec![
        json!({"number": "0001", "name": "Bulbasaur", "form": null, "types": ["Grass", "poison"],
               "height_cm": 70.0, "weight_kg": 6.9,
               "next_evolutions": [edge("0002", "Ivysaur", Some(16), None)]}),
        json!({"number": "0002", "name": "Ivysaur", "types": ["grass", "poison"],
               "height_cm": "100", "weight_kg": 13.0,
               "next_evolutions": [edge("0003", "Venusaur", Some(32), None)]}),
        json!({"number": "0003", "name": "Venusaur", "types": "grass", "height_cm": 200.0}),
        json!({"number": "0005", "name": "Charmeleon", "types": ["fire"], "height_cm": -5,
               "next_evolutions": [edge("0006", "Charizard", Some(36), None)]}),
        json!({"number": "0006", "name": "Charizard", "types": ["fire", "flying"], "weight_kg": 90.5}),
        json!({"number": "0006", "name": "Charizard", "form": "Mega Charizard X",
               "types": ["fire", "dragon"], "weight_kg": 110.5}),
        json!({"number": "0133", "name": "Eevee", "types": ["normal"],
               "next_evolutions": [edge("0134", "Vaporeon", None, Some("Water Stone"))]}),
        json!({"number": "0134", "name": "Vaporeon", "types": ["water"]}),
        // duplicate key; "Bulbasaur" sorts before "Zeta" and survives
        json!({"number": "0001", "name": "Zeta", "types": ["grass"]}),
        json!({"number": "", "name": "Nobody"}),
        json!({"name": "Numberless"}),
    ];
    let mut text: String = pokemons.iter().map(|line| format!("{line}\n")).collect();
    text.push_str("{not json\n\n");
    fs::write(dir.join(POKEMONS_RAW), text).unwrap();

    write_lines(
        &dir.join(ABILITIES_RAW),
        &[
            json!({"name": "Overgrow", "url": "https://pokemondb.net/ability/overgrow",
                   "effect": "Powers up Grass-type moves in a pinch."}),
            json!({"name": "Overgrow", "url": "https://pokemondb.net/ability/overgrow"}),
            json!({"name": "Blaze", "url": "https://pokemondb.net/ability/blaze"}),
            json!({"name": "Broken"}),
        ],
    );
}

#[test]
fn test_clean_data_dir_writes_normalized_streams() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());

    let report = clean_data_dir(dir.path(), dir.path()).unwrap();
    assert_eq!(report.pokemons_in, 11);
    assert_eq!(report.missing_identity, 2);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.pokemons_out, 8);
    assert_eq!(report.unparseable_lines, 1);
    assert_eq!(report.heights_nulled, 1);
    assert_eq!(report.abilities_out, 2);

    let clean = read_jsonl::<CleanPokemon>(&dir.path().join(POKEMONS_CLEAN))
        .unwrap()
        .rows;
    assert_eq!(clean.len(), 8);
    assert_eq!(clean[0].name, "Bulbasaur");
    assert_eq!(clean[0].types, vec!["grass", "poison"]);
    assert_eq!(clean[1].height_cm, Some(100.0));
    assert_eq!(clean[2].types, vec!["grass"]);
    let charmeleon = clean.iter().find(|p| p.number == "0005").unwrap();
    assert_eq!(charmeleon.height_cm, None);

    let abilities = read_jsonl::<CleanAbility>(&dir.path().join(ABILITIES_CLEAN))
        .unwrap()
        .rows;
    assert_eq!(abilities.len(), 2);
}

#[test]
fn test_clean_data_dir_tolerates_missing_raw_streams() {
    let dir = TempDir::new().unwrap();
    let report = clean_data_dir(dir.path(), dir.path()).unwrap();
    assert_eq!(report.pokemons_out, 0);
    assert!(dir.path().join(POKEMONS_CLEAN).exists());
    assert!(dir.path().join(ABILITIES_CLEAN).exists());
}

#[tokio::test]
async fn test_load_and_query_file_database() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    clean_data_dir(dir.path(), dir.path()).unwrap();

    let db = Database::new(&dir.path().join("pokedex.db")).await.unwrap();
    let store = Store::new(db);
    let report = store.load_clean_dir(dir.path()).await.unwrap();
    assert_eq!(report.pokemons, 8);
    assert_eq!(report.abilities, 2);
    assert_eq!(report.malformed, 0);

    assert_eq!(store.count_pokemon().await.unwrap(), 8);
    assert_eq!(store.count_abilities().await.unwrap(), 2);
    // Bulbasaur, Ivysaur and both Charizard entries
    assert_eq!(store.count_multi_type().await.unwrap(), 4);

    let fire = store.evolutions_of_type_above_level("Fire", 30).await.unwrap();
    let names: Vec<(&str, &str)> = fire
        .iter()
        .map(|p| (p.number.as_str(), p.form.as_str()))
        .collect();
    assert_eq!(names, vec![("0006", ""), ("0006", "Mega Charizard X")]);

    let grass = store.evolutions_of_type_above_level("grass", 30).await.unwrap();
    assert_eq!(grass.len(), 1);
    assert_eq!(grass[0].name, "Venusaur");

    let grass = store.evolutions_of_type_above_level("grass", 10).await.unwrap();
    assert_eq!(grass.len(), 2);

    // item-only edges never satisfy a level bound
    let water = store.evolutions_of_type_above_level("water", 0).await.unwrap();
    assert!(water.is_empty());
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let dir = TempDir::new().unwrap();
    seed_raw(dir.path());
    clean_data_dir(dir.path(), dir.path()).unwrap();

    let store = Store::new(Database::new_in_memory().await.unwrap());
    store.load_clean_dir(dir.path()).await.unwrap();
    store.load_clean_dir(dir.path()).await.unwrap();

    assert_eq!(store.count_pokemon().await.unwrap(), 8);
    assert_eq!(store.count_multi_type().await.unwrap(), 4);
    assert_eq!(
        store
            .evolutions_of_type_above_level("fire", 30)
            .await
            .unwrap()
            .len(),
        2
    );
}
