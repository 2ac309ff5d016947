//! CLI entry point for the pokedex tool.

use anyhow::Result;
use clap::Parser;
use pokedex_core::config;
use tracing::debug;

mod cli;
mod commands;
mod progress;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = config::load_config(args.config.as_deref())?;

    match args.command {
        Command::Crawl(crawl_args) => {
            let use_spinner = progress::spinner_enabled(args.quiet);
            commands::run_crawl_command(&crawl_args, &file_config, use_spinner).await
        }
        Command::Clean(clean_args) => commands::run_clean_command(&clean_args, &file_config),
        Command::Load(load_args) => commands::run_load_command(&load_args, &file_config).await,
        Command::Query(query_args) => commands::run_query_command(&query_args, &file_config).await,
    }
}
