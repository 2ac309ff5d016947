//! Pokédex scraping core.
//!
//! Crawls an online Pokédex, turns listing rows and detail pages into
//! structured creature records, and normalizes them into clean JSONL streams
//! that can be loaded into SQLite.
//!
//! # Architecture
//!
//! - [`extract`] - Listing row, detail page, evolution chart and ability extraction
//! - [`types`] - Type chart and defensive effectiveness
//! - [`dedup`] - Streaming duplicate filter keyed by `(number, form)`
//! - [`crawl`] - Polite HTTP fetching and crawl scheduling
//! - [`clean`] - Batch normalization of raw streams
//! - [`store`] - SQLite persistence and derived queries
//! - [`config`] - Optional TOML defaults for the CLI

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clean;
pub mod config;
pub mod crawl;
pub mod db;
pub mod dedup;
pub mod extract;
pub mod jsonl;
pub mod model;
pub mod store;
pub mod types;
pub mod user_agent;

// Re-export commonly used types
pub use clean::{CleanError, CleanPokemon, CleanReport, clean_data_dir};
pub use config::{ConfigError, FileConfig};
pub use crawl::{
    CrawlError, CrawlSettings, CrawlStats, Crawler, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES,
    DEFAULT_RATE_LIMIT_MS, HttpClient, RateLimiter, RetryPolicy,
};
pub use db::{Database, DbError};
pub use dedup::{DedupDecision, DedupFilter};
pub use extract::{extract_detail, extract_listing, resolve_next_evolutions};
pub use model::{AbilityRecord, EvolutionEdge, PokemonRecord, PokemonStub, RecordKey};
pub use store::{LoadReport, PokemonSummary, Store, StoreError};
pub use types::{PokeType, type_effectiveness};
