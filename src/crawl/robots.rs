//! Minimal robots.txt checking for polite crawling.
//!
//! Supports `User-agent: *` and `Disallow: /path` rules. Rules are cached per
//! origin for the lifetime of the cache (one crawl run).

use dashmap::DashMap;
use tracing::{debug, instrument};

use super::client::HttpClient;

/// Result of checking a URL against robots.txt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsDecision {
    Allowed,
    Disallowed,
}

/// Errors from robots.txt checking.
#[derive(Debug, thiserror::Error)]
pub enum RobotsError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("failed to fetch robots.txt: {0}")]
    Fetch(#[source] reqwest::Error),
    #[error("robots.txt returned status {1} for {0}")]
    Status(String, u16),
    #[error("failed to read robots.txt body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Per-origin cache of disallowed path prefixes.
#[derive(Debug, Default)]
pub struct RobotsCache {
    cache: DashMap<String, Vec<String>>,
}

impl RobotsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `url` against its origin's robots.txt, fetching it on first use.
    ///
    /// A missing robots.txt (404) allows everything.
    ///
    /// # Errors
    ///
    /// Returns [`RobotsError`] if the URL is invalid or robots.txt cannot be
    /// fetched.
    #[instrument(skip(self, client))]
    pub async fn check_allowed(
        &self,
        url: &str,
        client: &HttpClient,
    ) -> Result<RobotsDecision, RobotsError> {
        let parsed = url::Url::parse(url).map_err(|_| RobotsError::InvalidUrl(url.to_string()))?;
        let origin = parsed.origin().ascii_serialization();
        let path = match parsed.path() {
            "" => "/",
            path => path,
        };

        if !self.cache.contains_key(&origin) {
            let body = fetch_robots_txt(&origin, client).await?;
            self.cache.insert(origin.clone(), parse_disallow_rules(&body));
        }

        let disallowed = self
            .cache
            .get(&origin)
            .is_some_and(|rules| rules.iter().any(|prefix| path.starts_with(prefix.as_str())));
        if disallowed {
            debug!(path, origin = %origin, "robots.txt disallows path");
            Ok(RobotsDecision::Disallowed)
        } else {
            Ok(RobotsDecision::Allowed)
        }
    }
}

async fn fetch_robots_txt(origin: &str, client: &HttpClient) -> Result<String, RobotsError> {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));
    let response = client
        .inner()
        .get(&robots_url)
        .send()
        .await
        .map_err(RobotsError::Fetch)?;
    let status = response.status();
    if status.as_u16() == 404 {
        return Ok(String::new());
    }
    if !status.is_success() {
        return Err(RobotsError::Status(robots_url, status.as_u16()));
    }
    response.text().await.map_err(RobotsError::Body)
}

/// Disallow prefixes from the `User-agent: *` groups, longest first.
fn parse_disallow_rules(body: &str) -> Vec<String> {
    let mut in_star = false;
    let mut disallowed: Vec<String> = Vec::new();
    for line in body.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = strip_prefix_ignore_case(line, "user-agent:") {
            in_star = rest.trim() == "*";
            continue;
        }
        if in_star && let Some(rest) = strip_prefix_ignore_case(line, "disallow:") {
            let path = rest.trim();
            if path.is_empty() {
                continue;
            }
            let prefix = if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            };
            if !disallowed.contains(&prefix) {
                disallowed.push(prefix);
            }
        }
    }
    disallowed.sort_by_key(|b| std::cmp::Reverse(b.len()));
    disallowed
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}
