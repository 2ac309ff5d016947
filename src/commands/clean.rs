//! Clean command handler: normalize raw streams into clean streams.

use anyhow::Result;
use pokedex_core::{FileConfig, clean_data_dir};
use tracing::info;

use super::resolve_data_dir;
use crate::cli::CleanArgs;

pub fn run_clean_command(args: &CleanArgs, file_config: &FileConfig) -> Result<()> {
    let data_dir = resolve_data_dir(args.data_dir.as_deref(), file_config);
    let report = clean_data_dir(&data_dir, &data_dir)?;

    info!(
        pokemons_in = report.pokemons_in,
        pokemons_out = report.pokemons_out,
        duplicates = report.duplicates_removed,
        missing_identity = report.missing_identity,
        nested_dropped = report.nested_items_dropped,
        abilities_out = report.abilities_out,
        "Clean complete"
    );
    println!(
        "Cleaned {} of {} creature rows and {} of {} ability rows in {}",
        report.pokemons_out,
        report.pokemons_in,
        report.abilities_out,
        report.abilities_in,
        data_dir.display()
    );
    Ok(())
}
