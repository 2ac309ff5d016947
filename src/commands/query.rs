//! Query command handler: derived queries over the database.

use anyhow::{Result, bail};
use pokedex_core::{Database, FileConfig, Store};

use super::{resolve_data_dir, resolve_db_path};
use crate::cli::{QueryArgs, QueryCommand};

pub async fn run_query_command(args: &QueryArgs, file_config: &FileConfig) -> Result<()> {
    let data_dir = resolve_data_dir(None, file_config);
    let db_path = resolve_db_path(args.db.as_deref(), &data_dir, file_config);
    if !db_path.exists() {
        bail!(
            "database {} does not exist; run `pokedex load` first",
            db_path.display()
        );
    }

    let db = Database::new(&db_path).await?;
    let store = Store::new(db.clone());

    match &args.query {
        QueryCommand::MultiType => {
            let count = store.count_multi_type().await?;
            println!("{count}");
        }
        QueryCommand::Evolved {
            type_name,
            min_level,
        } => {
            let rows = store
                .evolutions_of_type_above_level(type_name, *min_level)
                .await?;
            if rows.is_empty() {
                println!("No {type_name} creatures evolve above level {min_level}.");
            }
            for row in rows {
                let form = if row.form.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", row.form)
                };
                println!(
                    "{}  {}{}  [{}]",
                    row.number,
                    row.name,
                    form,
                    row.types.join(", ")
                );
            }
        }
    }

    db.close().await;
    Ok(())
}
