//! End-to-end CLI tests for the pokedex binary.

#![allow(clippy::unwrap_used)]

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary isolated from any user config file.
fn pokedex(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pokedex").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    pokedex(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Crawl, clean and query"))
        .stdout(predicate::str::contains("crawl"))
        .stdout(predicate::str::contains("query"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    pokedex(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pokedex"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let home = TempDir::new().unwrap();
    pokedex(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    pokedex(&home)
        .args(["crawl", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_clean_on_empty_dir_succeeds() {
    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    pokedex(&home)
        .args(["-q", "clean", "--data-dir"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned 0 of 0"));
    assert!(data.path().join("pokemons_clean.jsonl").exists());
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "concurrency = 0\n").unwrap();
    pokedex(&home)
        .arg("--config")
        .arg(&config)
        .arg("clean")
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_default_config_supplies_data_dir() {
    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let config_dir = home.path().join("pokedex");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        format!("data_dir = {:?}\n", data.path().display().to_string()),
    )
    .unwrap();

    pokedex(&home).args(["-q", "clean"]).assert().success();
    assert!(data.path().join("pokemons_clean.jsonl").exists());
}

#[test]
fn test_clean_load_query_round() {
    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    fs::write(
        data.path().join("pokemons_raw.jsonl"),
        concat!(
            r#"{"number":"0001","name":"Bulbasaur","types":["grass","poison"],"next_evolutions":[{"to_number":"0002","to_name":"Ivysaur","to_url":"https://pokemondb.net/pokedex/ivysaur","level":16,"item":null}]}"#,
            "\n",
            r#"{"number":"0002","name":"Ivysaur","types":["grass","poison"]}"#,
            "\n",
            r#"{"number":"0004","name":"Charmander","types":["fire"]}"#,
            "\n",
        ),
    )
    .unwrap();

    pokedex(&home)
        .args(["-q", "clean", "--data-dir"])
        .arg(data.path())
        .assert()
        .success();
    pokedex(&home)
        .args(["-q", "load", "--data-dir"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 3 creatures"));

    let db = data.path().join("pokedex.db");
    pokedex(&home)
        .args(["-q", "query", "--db"])
        .arg(&db)
        .arg("multi-type")
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));
    pokedex(&home)
        .args(["-q", "query", "--db"])
        .arg(&db)
        .args(["evolved", "--type", "Grass", "--min-level", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0002  Ivysaur"));
}

#[test]
fn test_query_missing_database_fails() {
    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    pokedex(&home)
        .args(["query", "--db"])
        .arg(data.path().join("missing.db"))
        .arg("multi-type")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crawl_against_mock_site() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pokedex/all"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table id="pokedex"><tbody><tr>
                 <td class="cell-num">0007</td>
                 <td class="cell-name"><a class="ent-name" href="/pokedex/squirtle">Squirtle</a></td>
                 <td class="cell-icon"><a class="type-icon">Water</a></td>
               </tr></tbody></table>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pokedex/squirtle"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<h1>Squirtle</h1><table><tr><th>Height</th><td>0.5 m</td></tr></table>",
        ))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let listing = format!("{}/pokedex/all", server.uri());
    let data_dir = data.path().to_path_buf();
    let home_path = home.path().to_path_buf();

    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("pokedex")
            .unwrap()
            .env("XDG_CONFIG_HOME", home_path)
            .args(["-q", "crawl", "--no-robots", "--no-abilities", "-l", "0", "--listing-url"])
            .arg(listing)
            .arg("--data-dir")
            .arg(data_dir)
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let raw = fs::read_to_string(data.path().join("pokemons_raw.jsonl")).unwrap();
    assert_eq!(raw.lines().count(), 1);
    assert!(raw.contains(r#""name":"Squirtle""#));
    assert!(raw.contains(r#""height_cm":50.0"#));
}
