//! CLI command handlers.
//!
//! Settings resolve as explicit flag, then config file, then built-in default.

mod clean;
mod crawl;
mod load;
mod query;

use std::path::{Path, PathBuf};

use pokedex_core::FileConfig;
use pokedex_core::config::DEFAULT_DB_FILE;

pub use clean::run_clean_command;
pub use crawl::run_crawl_command;
pub use load::run_load_command;
pub use query::run_query_command;

fn resolve_data_dir(flag: Option<&Path>, file_config: &FileConfig) -> PathBuf {
    flag.map_or_else(|| file_config.data_dir_or_default(), Path::to_path_buf)
}

/// Database path: `--db`, then `db_path` from the config, then
/// `pokedex.db` inside the data directory.
fn resolve_db_path(flag: Option<&Path>, data_dir: &Path, file_config: &FileConfig) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| file_config.db_path.clone())
        .unwrap_or_else(|| data_dir.join(DEFAULT_DB_FILE))
}
