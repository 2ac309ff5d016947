//! Crawl engine: listing page, then detail pages, then abilities.
//!
//! Detail pages are fetched concurrently under a semaphore. Each unique
//! detail URL is fetched once and every stub pointing at it is completed from
//! that document. Completed records are sent over a channel to a single
//! writer task that owns the [`DedupFilter`] and the raw "pokemons" stream.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pokedex_core::crawl::{CrawlSettings, Crawler, HttpClient, RateLimiter, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = CrawlSettings::new("https://pokemondb.net/pokedex/all");
//! let crawler = Crawler::new(
//!     settings,
//!     HttpClient::new()?,
//!     RetryPolicy::default(),
//!     Arc::new(RateLimiter::new(Duration::from_millis(500))),
//! )?;
//! let stats = crawler.run(Path::new("data")).await?;
//! println!("wrote {} records", stats.records_written());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::error::FetchError;
use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::robots::{RobotsCache, RobotsDecision};
use crate::dedup::DedupFilter;
use crate::extract::{
    ExtractError, extract_ability, extract_ability_links, extract_detail, extract_listing,
};
use crate::jsonl::{ABILITIES_RAW, JsonlError, JsonlWriter, POKEMONS_RAW};
use crate::model::{AbilityRecord, PokemonRecord, PokemonStub};

const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 100;

/// Default number of concurrent page fetches.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Buffered records between fetch tasks and the writer.
const RECORD_CHANNEL_CAPACITY: usize = 256;

/// Error type for crawl runs. Only listing-level and output failures are
/// fatal; individual page failures are counted in [`CrawlStats`].
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency { value: usize },

    /// The listing page could not be fetched.
    #[error("failed to fetch listing {url}: {source}")]
    Listing {
        url: String,
        #[source]
        source: FetchError,
    },

    /// robots.txt disallows the listing page.
    #[error("robots.txt disallows listing {url}")]
    ListingDisallowed { url: String },

    #[error("failed to extract listing: {0}")]
    Extract(#[from] ExtractError),

    #[error("failed to write output: {0}")]
    Output(#[from] JsonlError),

    #[error("record writer task failed: {0}")]
    Writer(String),

    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Inputs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub listing_url: String,
    /// Ability listing to crawl after the creatures; `None` skips abilities.
    pub ability_listing_url: Option<String>,
    pub concurrency: usize,
    pub check_robots: bool,
}

impl CrawlSettings {
    /// Settings with defaults for everything but the listing URL.
    #[must_use]
    pub fn new(listing_url: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            ability_listing_url: None,
            concurrency: DEFAULT_CONCURRENCY,
            check_robots: true,
        }
    }
}

/// Counters for one crawl run, updated from concurrent tasks.
#[derive(Debug, Default)]
pub struct CrawlStats {
    listing_rows: AtomicUsize,
    rows_skipped: AtomicUsize,
    pages_fetched: AtomicUsize,
    fetch_failures: AtomicUsize,
    robots_skipped: AtomicUsize,
    retried: AtomicUsize,
    records_written: AtomicUsize,
    duplicates_rejected: AtomicUsize,
    abilities_written: AtomicUsize,
}

impl CrawlStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows found on the listing page, including skipped ones.
    #[must_use]
    pub fn listing_rows(&self) -> usize {
        self.listing_rows.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped.load(Ordering::SeqCst)
    }

    /// Pages fetched successfully (listings, details, abilities).
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn fetch_failures(&self) -> usize {
        self.fetch_failures.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn robots_skipped(&self) -> usize {
        self.robots_skipped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn duplicates_rejected(&self) -> usize {
        self.duplicates_rejected.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn abilities_written(&self) -> usize {
        self.abilities_written.load(Ordering::SeqCst)
    }

    fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::SeqCst);
    }
}

/// Everything a fetch task needs; cloned into each spawned task.
#[derive(Clone)]
struct Fetcher {
    client: HttpClient,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    robots: Option<Arc<RobotsCache>>,
    stats: Arc<CrawlStats>,
}

/// Outcome of a polite fetch.
enum Fetched {
    Page(String),
    Disallowed,
}

impl Fetcher {
    /// Robots check, rate limit, then GET with retries.
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        if let Some(robots) = &self.robots {
            match robots.check_allowed(url, &self.client).await {
                Ok(RobotsDecision::Disallowed) => {
                    CrawlStats::add(&self.stats.robots_skipped, 1);
                    info!(url, "skipping page disallowed by robots.txt");
                    return Ok(Fetched::Disallowed);
                }
                Ok(RobotsDecision::Allowed) => {}
                Err(e) => warn!(url, error = %e, "robots.txt check failed; proceeding"),
            }
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.rate_limiter.acquire(url).await;

            let error = match self.client.fetch_text(url).await {
                Ok(body) => {
                    CrawlStats::add(&self.stats.pages_fetched, 1);
                    return Ok(Fetched::Page(body));
                }
                Err(e) => e,
            };

            let failure_type = classify_error(&error);
            let retry_after = if failure_type == FailureType::RateLimited {
                retry_after_delay(&error, url, &self.rate_limiter)
            } else {
                None
            };

            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    let delay = retry_after.unwrap_or(delay);
                    info!(
                        url,
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    CrawlStats::add(&self.stats.retried, 1);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, %reason, "not retrying fetch");
                    return Err(error);
                }
            }
        }
    }
}

fn retry_after_delay(
    error: &FetchError,
    url: &str,
    rate_limiter: &RateLimiter,
) -> Option<std::time::Duration> {
    let FetchError::HttpStatus {
        retry_after: Some(header),
        ..
    } = error
    else {
        return None;
    };
    let delay = parse_retry_after(header)?;
    rate_limiter.record_rate_limit(url, delay);
    Some(delay)
}

/// Concurrent, polite crawler producing the raw JSONL streams.
#[derive(Debug)]
pub struct Crawler {
    settings: CrawlSettings,
    client: HttpClient,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
}

impl Crawler {
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidConcurrency`] if the concurrency is
    /// outside 1..=100.
    #[instrument(level = "debug", skip(client, retry_policy, rate_limiter))]
    pub fn new(
        settings: CrawlSettings,
        client: HttpClient,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, CrawlError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&settings.concurrency) {
            return Err(CrawlError::InvalidConcurrency {
                value: settings.concurrency,
            });
        }
        debug!(
            max_attempts = retry_policy.max_attempts(),
            rate_limit_ms = rate_limiter.default_delay().as_millis(),
            "creating crawler"
        );
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(settings.concurrency)),
            settings,
            client,
            retry_policy,
            rate_limiter,
        })
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.settings.concurrency
    }

    /// Crawls everything and writes `pokemons_raw.jsonl` (and
    /// `abilities_raw.jsonl` when an ability listing is configured) into
    /// `output_dir`.
    ///
    /// # Errors
    ///
    /// Fails if the listing page cannot be fetched or parsed, or if an output
    /// file cannot be written. Failures of individual detail or ability pages
    /// are logged and counted instead.
    pub async fn run(&self, output_dir: &Path) -> Result<CrawlStats, CrawlError> {
        let stats = Arc::new(CrawlStats::new());
        self.run_with_stats(output_dir, Arc::clone(&stats)).await?;
        Ok(Arc::try_unwrap(stats).unwrap_or_else(|shared| snapshot(&shared)))
    }

    /// Like [`Crawler::run`], but updates caller-owned `stats` so progress
    /// can be observed while the crawl is running.
    ///
    /// # Errors
    ///
    /// Same as [`Crawler::run`].
    #[instrument(skip(self, stats), fields(listing = %self.settings.listing_url, output_dir = %output_dir.display()))]
    pub async fn run_with_stats(
        &self,
        output_dir: &Path,
        stats: Arc<CrawlStats>,
    ) -> Result<(), CrawlError> {
        let fetcher = Fetcher {
            client: self.client.clone(),
            retry_policy: self.retry_policy.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            robots: self.settings.check_robots.then(|| Arc::new(RobotsCache::new())),
            stats: Arc::clone(&stats),
        };

        info!("starting crawl");
        self.crawl_pokemons(&fetcher, output_dir).await?;
        if let Some(ability_listing) = &self.settings.ability_listing_url {
            self.crawl_abilities(&fetcher, ability_listing, output_dir)
                .await?;
        }
        drop(fetcher);

        info!(
            listing_rows = stats.listing_rows(),
            rows_skipped = stats.rows_skipped(),
            pages_fetched = stats.pages_fetched(),
            fetch_failures = stats.fetch_failures(),
            robots_skipped = stats.robots_skipped(),
            retried = stats.retried(),
            records_written = stats.records_written(),
            duplicates_rejected = stats.duplicates_rejected(),
            abilities_written = stats.abilities_written(),
            "crawl complete"
        );
        Ok(())
    }

    async fn crawl_pokemons(&self, fetcher: &Fetcher, output_dir: &Path) -> Result<(), CrawlError> {
        let listing_url = &self.settings.listing_url;
        let html = match fetcher.fetch(listing_url).await {
            Ok(Fetched::Page(html)) => html,
            Ok(Fetched::Disallowed) => {
                return Err(CrawlError::ListingDisallowed {
                    url: listing_url.clone(),
                });
            }
            Err(source) => {
                return Err(CrawlError::Listing {
                    url: listing_url.clone(),
                    source,
                });
            }
        };

        let listing = extract_listing(&html, listing_url)?;
        let stats = &fetcher.stats;
        CrawlStats::add(&stats.listing_rows, listing.stubs.len() + listing.skipped);
        CrawlStats::add(&stats.rows_skipped, listing.skipped);

        let pages = group_by_url(listing.stubs);
        info!(rows = stats.listing_rows(), pages = pages.len(), "fetching detail pages");

        let mut writer = JsonlWriter::create(&output_dir.join(POKEMONS_RAW))?;
        let (tx, mut rx) = mpsc::channel::<PokemonRecord>(RECORD_CHANNEL_CAPACITY);
        let consumer: JoinHandle<Result<(usize, usize), JsonlError>> = tokio::spawn(async move {
            let mut filter = DedupFilter::new();
            while let Some(record) = rx.recv().await {
                if filter.admit(&record).is_keep() {
                    writer.write(&record)?;
                }
            }
            Ok::<_, JsonlError>((writer.finish()?, filter.rejected()))
        });

        let mut handles = Vec::with_capacity(pages.len());
        for (url, stubs) in pages {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| CrawlError::SemaphoreClosed)?;
            let fetcher = fetcher.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let html = match fetcher.fetch(&url).await {
                    Ok(Fetched::Page(html)) => html,
                    Ok(Fetched::Disallowed) => return,
                    Err(e) => {
                        warn!(url = %url, error = %e, records = stubs.len(), "detail fetch failed");
                        CrawlStats::add(&fetcher.stats.fetch_failures, 1);
                        return;
                    }
                };
                for stub in &stubs {
                    match extract_detail(&html, &url, stub) {
                        Ok(record) => {
                            if tx.send(record).await.is_err() {
                                warn!(url = %url, "record writer stopped; dropping records");
                                return;
                            }
                        }
                        Err(e) => warn!(url = %url, error = %e, "detail extraction failed"),
                    }
                }
            }));
        }
        drop(tx);

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "detail task panicked");
            }
        }

        let (written, rejected) = consumer
            .await
            .map_err(|e| CrawlError::Writer(e.to_string()))??;
        CrawlStats::add(&stats.records_written, written);
        CrawlStats::add(&stats.duplicates_rejected, rejected);
        Ok(())
    }

    async fn crawl_abilities(
        &self,
        fetcher: &Fetcher,
        listing_url: &str,
        output_dir: &Path,
    ) -> Result<(), CrawlError> {
        let links = match fetcher.fetch(listing_url).await {
            Ok(Fetched::Page(html)) => extract_ability_links(&html, listing_url)?,
            Ok(Fetched::Disallowed) => Vec::new(),
            Err(e) => {
                warn!(url = listing_url, error = %e, "ability listing fetch failed; skipping abilities");
                CrawlStats::add(&fetcher.stats.fetch_failures, 1);
                Vec::new()
            }
        };
        info!(abilities = links.len(), "fetching ability pages");

        let mut handles: Vec<JoinHandle<Option<AbilityRecord>>> = Vec::with_capacity(links.len());
        for url in links {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| CrawlError::SemaphoreClosed)?;
            let fetcher = fetcher.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                match fetcher.fetch(&url).await {
                    Ok(Fetched::Page(html)) => extract_ability(&html, &url),
                    Ok(Fetched::Disallowed) => None,
                    Err(e) => {
                        warn!(url = %url, error = %e, "ability fetch failed");
                        CrawlStats::add(&fetcher.stats.fetch_failures, 1);
                        None
                    }
                }
            }));
        }

        let mut writer = JsonlWriter::create(&output_dir.join(ABILITIES_RAW))?;
        for handle in handles {
            match handle.await {
                Ok(Some(ability)) => writer.write(&ability)?,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "ability task panicked"),
            }
        }
        let written = writer.finish()?;
        CrawlStats::add(&fetcher.stats.abilities_written, written);
        Ok(())
    }
}

/// Stubs grouped by detail URL, in first-seen order.
fn group_by_url(stubs: Vec<PokemonStub>) -> Vec<(String, Vec<PokemonStub>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut pages: Vec<(String, Vec<PokemonStub>)> = Vec::new();
    for stub in stubs {
        if let Some(&i) = index.get(&stub.url) {
            pages[i].1.push(stub);
        } else {
            index.insert(stub.url.clone(), pages.len());
            pages.push((stub.url.clone(), vec![stub]));
        }
    }
    pages
}

fn snapshot(shared: &CrawlStats) -> CrawlStats {
    let copy = |counter: &AtomicUsize| AtomicUsize::new(counter.load(Ordering::SeqCst));
    CrawlStats {
        listing_rows: copy(&shared.listing_rows),
        rows_skipped: copy(&shared.rows_skipped),
        pages_fetched: copy(&shared.pages_fetched),
        fetch_failures: copy(&shared.fetch_failures),
        robots_skipped: copy(&shared.robots_skipped),
        retried: copy(&shared.retried),
        records_written: copy(&shared.records_written),
        duplicates_rejected: copy(&shared.duplicates_rejected),
        abilities_written: copy(&shared.abilities_written),
    }
}
