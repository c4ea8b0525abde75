//! Error types for the reqwest-proxy-rotator crate.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the caller of [`Rotator`](crate::Rotator).
///
/// Per-attempt failures never show up here; they are absorbed into the
/// attempt counters and end up as [`TargetOutcome::Failed`](crate::TargetOutcome).
#[derive(Debug, Error)]
pub enum Error {
    /// The same target URL was supplied more than once.
    #[error("Duplicate target URL: {0}")]
    DuplicateTarget(String),

    /// A target could not be parsed as an absolute URL.
    #[error("Invalid target URL {url}: {reason}")]
    InvalidTarget { url: String, reason: String },

    /// Consecutive pool refreshes produced no usable proxy.
    #[error("No usable proxy after {attempts} pool refreshes")]
    ProxyExhaustion { attempts: usize },

    /// The HTTP client for listing pages could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error comes from the supplied configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::DuplicateTarget(_) | Error::InvalidTarget { .. })
    }
}

/// Failure to obtain candidates from one proxy listing page.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The listing page could not be reached.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The page was reached but looked like a challenge or non-HTML response.
    #[error("Rejected listing page: {0}")]
    Rejected(String),

    /// The page contained no proxy table.
    #[error("Failed to parse listing page: {0}")]
    Parse(String),

    /// Retries were exhausted without obtaining a real page.
    #[error("Gave up on {url} after {attempts} attempts in {elapsed:?}: {last}")]
    GaveUp {
        url: String,
        attempts: usize,
        elapsed: Duration,
        last: String,
    },
}

impl SourceError {
    /// Whether fetching the page again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Network(_) | SourceError::Rejected(_))
    }
}
