//! Error types for document extraction.

use thiserror::Error;

/// Structural failures while extracting from a fetched document.
///
/// None of these abort a run: callers degrade to an empty result and log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The page URL the document was fetched from is not a valid absolute URL.
    #[error("invalid page URL '{url}': {reason}")]
    InvalidPageUrl {
        /// The URL that failed to parse
        url: String,
        /// Parser message
        reason: String,
    },

    /// A link in the document could not be resolved against the page URL.
    #[error("unresolvable href '{href}' on {page}")]
    UnresolvableHref {
        /// Raw href attribute value
        href: String,
        /// Page the href was found on
        page: String,
    },
}

impl ExtractError {
    /// Creates an `InvalidPageUrl` error from a URL parse failure.
    #[must_use]
    pub fn invalid_page_url(url: &str, error: &url::ParseError) -> Self {
        Self::InvalidPageUrl {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }

    /// Creates an `UnresolvableHref` error.
    #[must_use]
    pub fn unresolvable_href(href: &str, page: &str) -> Self {
        Self::UnresolvableHref {
            href: href.to_string(),
            page: page.to_string(),
        }
    }
}
