//! Page fetching and crawl scheduling.
//!
//! Fetches the listing, detail, and ability pages politely (per-domain delay,
//! optional robots.txt check, retry with backoff) and feeds them to the
//! extractors. Extraction itself lives in [`crate::extract`].

mod client;
mod engine;
mod error;
pub mod rate_limiter;
mod retry;
mod robots;

pub use client::{CONNECT_TIMEOUT_SECS, HttpClient, READ_TIMEOUT_SECS};
pub use engine::{CrawlError, CrawlSettings, CrawlStats, Crawler, DEFAULT_CONCURRENCY};
pub use error::FetchError;
pub use rate_limiter::{DEFAULT_RATE_LIMIT_MS, RateLimiter, extract_domain, parse_retry_after};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
pub use robots::{RobotsCache, RobotsDecision, RobotsError};
