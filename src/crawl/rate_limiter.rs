//! Per-domain politeness delay.
//!
//! Requests to different domains proceed independently; consecutive requests
//! to the same domain are spaced by at least the configured delay.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pokedex_core::crawl::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
//! limiter.acquire("https://pokemondb.net/pokedex/all").await;
//! limiter.acquire("https://pokemondb.net/pokedex/bulbasaur").await; // waits ~500ms
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Cumulative per-domain delay after which a warning is logged.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Cap for server-provided Retry-After values.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Default delay between requests to one domain.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 500;

/// Shared per-domain rate limiter. Wrap in `Arc` to share across tasks.
#[derive(Debug)]
pub struct RateLimiter {
    default_delay: Duration,
    disabled: bool,
    /// `Arc` values let the `DashMap` shard lock be released before awaiting
    /// the inner mutex.
    domains: DashMap<String, Arc<DomainState>>,
}

#[derive(Debug)]
struct DomainState {
    /// `None` until the first request; the first request is never delayed.
    last_request: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl DomainState {
    fn new() -> Self {
        Self {
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = default_delay.as_millis()))]
    pub fn new(default_delay: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            default_delay,
            disabled: default_delay.is_zero(),
            domains: DashMap::new(),
        }
    }

    /// A limiter that never delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    /// Waits until a request to `url`'s domain is allowed, then records it.
    #[instrument(skip(self), fields(domain))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let domain = extract_domain(url);
        tracing::Span::current().record("domain", &domain);

        let state = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(DomainState::new()))
            .clone();

        let mut last_request_guard = state.last_request.lock().await;
        if let Some(last_request) = *last_request_guard {
            let elapsed = last_request.elapsed();
            if elapsed < self.default_delay {
                let delay = self.default_delay.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(delay);
                debug!(
                    domain = %domain,
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "applying rate limit delay"
                );
                warn_if_excessive(&domain, cumulative);
                tokio::time::sleep(delay).await;
            }
        }
        *last_request_guard = Some(Instant::now());
    }

    /// Records a server-mandated delay (from Retry-After) against the domain.
    pub fn record_rate_limit(&self, url: &str, delay: Duration) {
        let domain = extract_domain(url);
        let state = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(DomainState::new()));
        let cumulative = state.add_cumulative_delay(delay);
        debug!(
            domain = %domain,
            delay_ms = delay.as_millis(),
            "recorded server rate limit"
        );
        warn_if_excessive(&domain, cumulative);
    }
}

fn warn_if_excessive(domain: &str, cumulative: Duration) {
    if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
        warn!(
            domain,
            cumulative_delay_secs = cumulative.as_secs(),
            "excessive rate limiting for domain"
        );
    }
}

/// Lowercased host of `url`, or `"unknown"` when it has none.
///
/// ```
/// use pokedex_core::crawl::extract_domain;
///
/// assert_eq!(extract_domain("https://PokemonDB.net/pokedex/all"), "pokemondb.net");
/// assert_eq!(extract_domain("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After value: integer seconds or an HTTP-date.
///
/// Negative or unparseable values yield `None`; past dates yield zero; values
/// above one hour are capped.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    let delay = datetime
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Some(delay.min(MAX_RETRY_AFTER))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_retry_after_caps_at_one_hour() {
        assert_eq!(parse_retry_after("99999"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_past_date_is_zero() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_zero_delay_is_disabled() {
        assert!(RateLimiter::new(Duration::ZERO).is_disabled());
        assert!(RateLimiter::disabled().is_disabled());
        assert!(!RateLimiter::new(Duration::from_millis(10)).is_disabled());
    }

    #[tokio::test]
    async fn test_acquire_spaces_same_domain_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = std::time::Instant::now();
        limiter.acquire("https://pokemondb.net/a").await;
        limiter.acquire("https://pokemondb.net/b").await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_acquire_different_domains_do_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = std::time::Instant::now();
        limiter.acquire("https://a.test/").await;
        limiter.acquire("https://b.test/").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
