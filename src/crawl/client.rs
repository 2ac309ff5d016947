//! Shared HTTP client for page fetches.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, instrument};

use super::error::FetchError;
use crate::user_agent;

/// Default HTTP connect timeout.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout.
pub const READ_TIMEOUT_SECS: u64 = 60;

/// HTTP client wrapper; cheap to clone, shares one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeouts, gzip, and the tool User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialized.
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_crawler_user_agent())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// GETs `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for invalid URLs, network failures, timeouts,
    /// non-success statuses (with any Retry-After value), or unreadable bodies.
    #[instrument(skip(self))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        if url::Url::parse(url).is_err() {
            return Err(FetchError::invalid_url(url));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_send(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(FetchError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        let body = response.text().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    source,
                }
            }
        })?;
        debug!(bytes = body.len(), "fetched page");
        Ok(body)
    }

    /// The underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
