//! Configuration for the rotator and its proxy sources.

use std::time::Duration;

/// Public listing pages scraped when no sources are configured.
pub const DEFAULT_SOURCES: [&str; 4] = [
    "https://www.us-proxy.org/",
    "https://www.sslproxies.org/",
    "https://free-proxy-list.net/uk-proxy.html",
    "https://free-proxy-list.net/anonymous-proxy.html",
];

/// How hard to try a single proxy listing page.
///
/// Listing sites are fetched directly, without a proxy, and are expected to
/// come back eventually, so the budget is time based rather than count based.
#[derive(Debug, Clone)]
pub struct SourceRetryPolicy {
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay.
    pub max_backoff: Duration,
    /// Give up once this much time has passed since the first attempt.
    pub max_elapsed: Duration,
    /// Timeout of a single listing request.
    pub request_timeout: Duration,
    /// Pages smaller than this are treated as anti-bot challenges.
    pub min_page_bytes: usize,
}

impl SourceRetryPolicy {
    /// Backoff to wait after the given number of failed attempts (1-based).
    pub fn backoff(&self, failures: usize) -> Duration {
        let exponent = failures.saturating_sub(1).min(16) as u32;
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_backoff)
    }
}

impl Default for SourceRetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(300),
            request_timeout: Duration::from_secs(5),
            min_page_bytes: 5000,
        }
    }
}

/// Configuration for a [`Rotator`](crate::Rotator) run.
#[derive(Debug, Clone)]
pub struct RotatorConfig {
    /// Accept only elite proxies and reject undersized pages.
    pub incognito: bool,
    /// Number of fetches in flight per round.
    pub worker_count: usize,
    /// Verify TLS certificates of target servers.
    pub verify_tls: bool,
    /// How long the rotator waits for one dispatched fetch.
    pub result_timeout: Duration,
    /// Timeout of the HTTP request itself.
    pub request_timeout: Duration,
    /// Failed attempts tolerated per target before it is given up.
    pub max_attempts: usize,
    /// In incognito mode, a page must be larger than this to be accepted.
    pub min_content_bytes: usize,
    /// Refresh the pool when it shrinks below this size.
    pub low_water_mark: usize,
    /// Consecutive empty refreshes tolerated before the run fails.
    pub max_refresh_attempts: usize,
    /// Also evict a proxy when the page it returned was rejected as undersized.
    pub evict_on_rejection: bool,
    /// Proxy listing pages.
    pub sources: Vec<String>,
    /// Retry policy for each listing page.
    pub source_retry: SourceRetryPolicy,
    /// Seed for identity sampling and pool shuffling.
    pub seed: Option<u64>,
}

impl RotatorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RotatorConfigBuilder {
        RotatorConfigBuilder::new()
    }
}

impl Default for RotatorConfig {
    fn default() -> Self {
        RotatorConfigBuilder::new().build()
    }
}

/// Builder for `RotatorConfig`.
pub struct RotatorConfigBuilder {
    incognito: Option<bool>,
    worker_count: Option<usize>,
    verify_tls: Option<bool>,
    result_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_attempts: Option<usize>,
    min_content_bytes: Option<usize>,
    low_water_mark: Option<usize>,
    max_refresh_attempts: Option<usize>,
    evict_on_rejection: Option<bool>,
    sources: Vec<String>,
    source_retry: Option<SourceRetryPolicy>,
    seed: Option<u64>,
}

impl RotatorConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            incognito: None,
            worker_count: None,
            verify_tls: None,
            result_timeout: None,
            request_timeout: None,
            max_attempts: None,
            min_content_bytes: None,
            low_water_mark: None,
            max_refresh_attempts: None,
            evict_on_rejection: None,
            sources: Vec::new(),
            source_retry: None,
            seed: None,
        }
    }

    /// Only use elite proxies and apply the content size filter.
    pub fn incognito(mut self, incognito: bool) -> Self {
        self.incognito = Some(incognito);
        self
    }

    /// Set the number of concurrent fetches per round.
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Enable or disable TLS certificate verification for targets.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    /// Set how long to wait for each dispatched fetch.
    pub fn result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = Some(timeout);
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the number of failed attempts tolerated per target.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the incognito content size threshold in bytes.
    pub fn min_content_bytes(mut self, bytes: usize) -> Self {
        self.min_content_bytes = Some(bytes);
        self
    }

    /// Set the pool size below which a refresh is triggered.
    pub fn low_water_mark(mut self, size: usize) -> Self {
        self.low_water_mark = Some(size);
        self
    }

    /// Set the number of consecutive empty refreshes tolerated.
    pub fn max_refresh_attempts(mut self, attempts: usize) -> Self {
        self.max_refresh_attempts = Some(attempts);
        self
    }

    /// Choose whether undersized pages also evict the proxy that served them.
    pub fn evict_on_rejection(mut self, evict: bool) -> Self {
        self.evict_on_rejection = Some(evict);
        self
    }

    /// Set the proxy listing pages to scrape.
    pub fn sources(mut self, sources: Vec<impl Into<String>>) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry policy for listing pages.
    pub fn source_retry(mut self, policy: SourceRetryPolicy) -> Self {
        self.source_retry = Some(policy);
        self
    }

    /// Seed the random source for a reproducible run.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RotatorConfig {
        let sources = if self.sources.is_empty() {
            DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
        } else {
            self.sources
        };

        RotatorConfig {
            incognito: self.incognito.unwrap_or(true),
            worker_count: self.worker_count.unwrap_or(4).max(1),
            verify_tls: self.verify_tls.unwrap_or(true),
            result_timeout: self.result_timeout.unwrap_or(Duration::from_secs(3)),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(3)),
            max_attempts: self.max_attempts.unwrap_or(9),
            min_content_bytes: self.min_content_bytes.unwrap_or(35_000),
            low_water_mark: self.low_water_mark.unwrap_or(40),
            max_refresh_attempts: self.max_refresh_attempts.unwrap_or(5).max(1),
            evict_on_rejection: self.evict_on_rejection.unwrap_or(true),
            sources,
            source_retry: self.source_retry.unwrap_or_default(),
            seed: self.seed,
        }
    }
}

impl Default for RotatorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
