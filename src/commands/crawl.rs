//! Crawl command handler: fetch pages into raw JSONL streams.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use pokedex_core::config::{DEFAULT_ABILITY_LISTING_URL, DEFAULT_LISTING_URL};
use pokedex_core::crawl::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use pokedex_core::{
    CrawlSettings, CrawlStats, Crawler, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES,
    DEFAULT_RATE_LIMIT_MS, FileConfig, HttpClient, RateLimiter, RetryPolicy,
};
use tracing::{debug, info};

use super::resolve_data_dir;
use crate::cli::CrawlArgs;
use crate::progress;

fn build_settings(args: &CrawlArgs, file_config: &FileConfig) -> CrawlSettings {
    let listing_url = args
        .listing_url
        .clone()
        .or_else(|| file_config.listing_url.clone())
        .unwrap_or_else(|| DEFAULT_LISTING_URL.to_string());

    let ability_listing_url = if args.no_abilities {
        None
    } else {
        Some(
            args.ability_listing_url
                .clone()
                .or_else(|| file_config.ability_listing_url.clone())
                .unwrap_or_else(|| DEFAULT_ABILITY_LISTING_URL.to_string()),
        )
    };

    let mut settings = CrawlSettings::new(listing_url);
    settings.ability_listing_url = ability_listing_url;
    settings.concurrency = args
        .concurrency
        .map(usize::from)
        .or(file_config.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    settings.check_robots = !args.no_robots && file_config.check_robots.unwrap_or(true);
    settings
}

pub async fn run_crawl_command(
    args: &CrawlArgs,
    file_config: &FileConfig,
    use_spinner: bool,
) -> Result<()> {
    let data_dir = resolve_data_dir(args.data_dir.as_deref(), file_config);
    let settings = build_settings(args, file_config);

    let max_retries = args
        .max_retries
        .map(u32::from)
        .or(file_config.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES);
    let rate_limit_ms = args
        .rate_limit
        .or(file_config.rate_limit_ms)
        .unwrap_or(DEFAULT_RATE_LIMIT_MS);

    let client = HttpClient::new_with_timeouts(
        file_config
            .connect_timeout_secs
            .unwrap_or(CONNECT_TIMEOUT_SECS),
        file_config.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
    )?;

    let rate_limiter = if rate_limit_ms == 0 {
        debug!("rate limiting disabled");
        Arc::new(RateLimiter::disabled())
    } else {
        debug!(rate_limit_ms, "rate limiting enabled");
        Arc::new(RateLimiter::new(Duration::from_millis(rate_limit_ms)))
    };

    let crawler = Crawler::new(
        settings,
        client,
        RetryPolicy::with_max_retries(max_retries),
        rate_limiter,
    )?;
    let stats = Arc::new(CrawlStats::new());
    let (progress, stop) = progress::spawn_progress_ui(use_spinner, Arc::clone(&stats));
    let result = crawler.run_with_stats(&data_dir, Arc::clone(&stats)).await;
    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress {
        let _ = handle.await;
    }
    result?;

    info!(
        listing_rows = stats.listing_rows(),
        rows_skipped = stats.rows_skipped(),
        pages_fetched = stats.pages_fetched(),
        fetch_failures = stats.fetch_failures(),
        robots_skipped = stats.robots_skipped(),
        retried = stats.retried(),
        duplicates = stats.duplicates_rejected(),
        "Crawl complete"
    );
    println!(
        "Wrote {} creature records and {} abilities to {}",
        stats.records_written(),
        stats.abilities_written(),
        data_dir.display()
    );
    Ok(())
}
