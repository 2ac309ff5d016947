//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Crawl, clean and query an online Pokédex.
///
/// `crawl` writes raw JSONL streams, `clean` normalizes them, `load` upserts
/// the clean streams into SQLite and `query` runs the derived queries.
#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/pokedex/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the listing and detail pages into raw JSONL streams
    Crawl(CrawlArgs),
    /// Normalize the raw streams into clean JSONL streams
    Clean(CleanArgs),
    /// Upsert the clean streams into the SQLite database
    Load(LoadArgs),
    /// Run a derived query against the database
    Query(QueryArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct CrawlArgs {
    /// Creature listing page
    #[arg(long, value_name = "URL")]
    pub listing_url: Option<String>,

    /// Ability listing page
    #[arg(long, value_name = "URL", conflicts_with = "no_abilities")]
    pub ability_listing_url: Option<String>,

    /// Skip the ability crawl
    #[arg(long)]
    pub no_abilities: bool,

    /// Directory for the raw JSONL streams
    #[arg(short = 'd', long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Maximum concurrent page fetches (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Minimum delay between requests to same domain in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Maximum retries for transient failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Do not consult robots.txt
    #[arg(long)]
    pub no_robots: bool,
}

#[derive(clap::Args, Debug, Default)]
pub struct CleanArgs {
    /// Directory holding the raw streams; clean streams are written beside them
    #[arg(short = 'd', long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Default)]
pub struct LoadArgs {
    /// Directory holding the clean streams
    #[arg(short = 'd', long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// SQLite database file
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub query: QueryCommand,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Count creatures with more than one type
    MultiType,
    /// List creatures of a type reached by evolving above a level
    Evolved {
        /// Type name, case-insensitive
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        type_name: String,

        /// Exclusive lower bound on the evolution level
        #[arg(short = 'm', long, default_value_t = 30)]
        min_level: u32,
    },
}
