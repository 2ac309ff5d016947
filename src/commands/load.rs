//! Load command handler: upsert clean streams into SQLite.

use anyhow::{Context, Result};
use pokedex_core::{Database, FileConfig, Store};
use tracing::info;

use super::{resolve_data_dir, resolve_db_path};
use crate::cli::LoadArgs;

pub async fn run_load_command(args: &LoadArgs, file_config: &FileConfig) -> Result<()> {
    let data_dir = resolve_data_dir(args.data_dir.as_deref(), file_config);
    let db_path = resolve_db_path(args.db.as_deref(), &data_dir, file_config);

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let db = Database::new(&db_path).await?;
    let store = Store::new(db.clone());
    let report = store.load_clean_dir(&data_dir).await?;
    let total = store.count_pokemon().await?;
    db.close().await;

    info!(
        pokemons = report.pokemons,
        abilities = report.abilities,
        malformed = report.malformed,
        failed = report.failed,
        total,
        db = %db_path.display(),
        "Load complete"
    );
    println!(
        "Loaded {} creatures and {} abilities into {} ({} creatures stored)",
        report.pokemons,
        report.abilities,
        db_path.display(),
        total
    );
    if report.failed > 0 {
        println!("Skipped {} rows the database rejected", report.failed);
    }
    Ok(())
}
