//! Retry coordination across a rotating proxy pool.
//!
//! The rotator runs in rounds. Each round pairs pending targets with pool
//! proxies by position, dispatches the pairs with bounded concurrency, and
//! folds every outcome back into its own state. Only the fold touches the
//! pool, the attempt counters and the pending set, one outcome at a time, so
//! none of them needs a lock.

use crate::config::RotatorConfig;
use crate::error::Error;
use crate::identity::{Identity, IdentitySampler, UserAgentTable};
use crate::pool::ProxyPool;
use crate::proxy::ProxyEndpoint;
use crate::source::{CandidateSource, HtmlTableSource};
use crate::worker::{FetchOutcome, Fetcher, HttpFetcher};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use url::Url;

/// Text stored for targets that could not be fetched.
pub const FAILURE_SENTINEL: &str = "Nothing";

/// Final result for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// The raw page body.
    Content(String),
    /// The attempt budget ran out.
    Failed,
}

impl TargetOutcome {
    /// Whether the target was fetched.
    pub fn is_success(&self) -> bool {
        matches!(self, TargetOutcome::Content(_))
    }

    /// The fetched body, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            TargetOutcome::Content(content) => Some(content),
            TargetOutcome::Failed => None,
        }
    }

    /// The body, or [`FAILURE_SENTINEL`] for failed targets.
    pub fn as_text(&self) -> &str {
        self.content().unwrap_or(FAILURE_SENTINEL)
    }
}

/// Lifecycle of a target. `Succeeded` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Succeeded,
    Failed,
}

/// Progress after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Round just completed, starting at 1.
    pub round: usize,
    /// Targets in a final state.
    pub resolved: usize,
    /// All targets.
    pub total: usize,
}

impl Progress {
    /// Share of resolved targets, 0 to 100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.resolved as f64 / self.total as f64 * 100.0
    }
}

/// Receives progress after every round.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

impl<F> ProgressObserver for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn on_progress(&self, progress: Progress) {
        self(progress)
    }
}

/// Logs progress at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, progress: Progress) {
        info!("Downloading... {:.1}%", progress.percent());
    }
}

/// Counters collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub rounds: usize,
    pub attempts: usize,
    pub failed_attempts: usize,
    pub evictions: usize,
    pub refreshes: usize,
}

/// How a single outcome is judged.
#[derive(Debug)]
enum Verdict {
    Accepted(String),
    /// A page came back but is too small to be the real one.
    Rejected(usize),
    TransportFailed,
}

/// Fetches every target through the proxy pool, retrying with other proxies
/// and identities until each target succeeds or runs out of attempts.
pub struct Rotator {
    config: RotatorConfig,
    total: usize,
    pending: Vec<String>,
    attempts: HashMap<String, usize>,
    results: HashMap<String, TargetOutcome>,
    pool: ProxyPool,
    fetcher: Arc<dyn Fetcher>,
    sampler: Arc<dyn IdentitySampler>,
    observer: Arc<dyn ProgressObserver>,
    rng: StdRng,
    report: RunReport,
}

impl Rotator {
    /// Create a rotator that scrapes the configured listing pages and fetches
    /// targets over HTTP.
    ///
    /// Fails if a target is duplicated or not an absolute URL. No request is
    /// made until [`run`](Self::run).
    pub fn new(targets: Vec<impl Into<String>>, config: RotatorConfig) -> Result<Self, Error> {
        let targets = validate_targets(targets)?;
        let sampler: Arc<dyn IdentitySampler> = Arc::new(UserAgentTable::default());
        let source = HtmlTableSource::new(
            config.source_retry.clone(),
            Arc::clone(&sampler),
            config.seed.map(|seed| seed.wrapping_add(1)),
        )?;
        let fetcher = HttpFetcher::new(config.verify_tls);

        Ok(Self::assemble(targets, config, Arc::new(source), Arc::new(fetcher), sampler))
    }

    /// Create a rotator from custom parts.
    pub fn with_parts(
        targets: Vec<impl Into<String>>,
        config: RotatorConfig,
        source: Arc<dyn CandidateSource>,
        fetcher: Arc<dyn Fetcher>,
        sampler: Arc<dyn IdentitySampler>,
    ) -> Result<Self, Error> {
        let targets = validate_targets(targets)?;
        Ok(Self::assemble(targets, config, source, fetcher, sampler))
    }

    fn assemble(
        targets: Vec<String>,
        config: RotatorConfig,
        source: Arc<dyn CandidateSource>,
        fetcher: Arc<dyn Fetcher>,
        sampler: Arc<dyn IdentitySampler>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let attempts = targets.iter().map(|t| (t.clone(), 0)).collect();
        let pool = ProxyPool::new(source, config.sources.clone());

        Self {
            total: targets.len(),
            pending: targets,
            attempts,
            results: HashMap::new(),
            pool,
            fetcher,
            sampler,
            observer: Arc::new(LogProgress),
            rng,
            report: RunReport::default(),
            config,
        }
    }

    /// Replace the progress observer.
    pub fn observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Run rounds until every target is resolved.
    ///
    /// The returned map has exactly one entry per target. The only error is
    /// [`Error::ProxyExhaustion`], when the pool cannot be refilled.
    pub async fn run(&mut self) -> Result<HashMap<String, TargetOutcome>, Error> {
        let strict = self.config.incognito;
        info!("Fetching {} targets (incognito: {})", self.total, strict);

        while !self.pending.is_empty() {
            if self.pool.is_empty() {
                let result = self
                    .pool
                    .refresh_until_usable(strict, self.config.max_refresh_attempts, &mut self.rng)
                    .await;
                self.report.refreshes = self.pool.refresh_count();
                result?;
            }

            self.run_round().await;

            if !self.pending.is_empty() && self.pool.len() < self.config.low_water_mark {
                info!(
                    "Proxy pool below {} ({} left), refreshing",
                    self.config.low_water_mark,
                    self.pool.len()
                );
                self.pool.refresh(strict, &mut self.rng).await;
                self.report.refreshes = self.pool.refresh_count();
            }

            self.observer.on_progress(self.progress());
        }

        info!(
            "Finished {} targets in {} rounds: {} attempts, {} evictions, {} refreshes",
            self.total,
            self.report.rounds,
            self.report.attempts,
            self.report.evictions,
            self.report.refreshes
        );
        Ok(self.results.clone())
    }

    async fn run_round(&mut self) {
        self.report.rounds += 1;

        let pairs: Vec<(String, ProxyEndpoint, Identity)> = self
            .pending
            .iter()
            .zip(self.pool.endpoints())
            .map(|(url, proxy)| (url.clone(), proxy.clone(), self.sampler.sample(&mut self.rng)))
            .collect();
        debug!("Round {}: dispatching {} fetches", self.report.rounds, pairs.len());

        let fetcher = Arc::clone(&self.fetcher);
        let request_timeout = self.config.request_timeout;
        let result_timeout = self.config.result_timeout;

        let mut outcomes = stream::iter(pairs)
            .map(move |(url, proxy, identity)| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    let result = tokio::time::timeout(
                        result_timeout,
                        fetcher.fetch(&url, &proxy, &identity, request_timeout),
                    )
                    .await;
                    match result {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            debug!("Gave up waiting for {} through {}", url, proxy.key());
                            FetchOutcome::failed(proxy, url)
                        }
                    }
                }
            })
            .buffer_unordered(self.config.worker_count);

        while let Some(outcome) = outcomes.next().await {
            self.fold(outcome);
        }
    }

    fn fold(&mut self, outcome: FetchOutcome) {
        let FetchOutcome { proxy, url, content } = outcome;
        if !self.pending.contains(&url) {
            return;
        }
        self.report.attempts += 1;

        let verdict = self.judge(content);
        let evict = match &verdict {
            Verdict::Accepted(_) => false,
            Verdict::Rejected(_) => self.config.evict_on_rejection,
            Verdict::TransportFailed => true,
        };

        match verdict {
            Verdict::Accepted(content) => {
                self.resolve(&url, TargetOutcome::Content(content));
            }
            verdict => {
                self.report.failed_attempts += 1;
                if evict && self.pool.evict(&proxy) {
                    self.report.evictions += 1;
                }

                let count = self.attempts.entry(url.clone()).or_insert(0);
                *count += 1;
                let count = *count;
                debug!("{} failed through {} ({:?}), attempt {}", url, proxy.key(), verdict, count);

                if count > self.config.max_attempts {
                    warn!("Giving up on {} after {} attempts", url, count);
                    self.resolve(&url, TargetOutcome::Failed);
                }
            }
        }
    }

    fn judge(&self, content: Option<String>) -> Verdict {
        match content {
            None => Verdict::TransportFailed,
            Some(content) if self.config.incognito && content.len() <= self.config.min_content_bytes => {
                Verdict::Rejected(content.len())
            }
            Some(content) => Verdict::Accepted(content),
        }
    }

    fn resolve(&mut self, url: &str, outcome: TargetOutcome) {
        self.pending.retain(|pending| pending != url);
        self.results.insert(url.to_string(), outcome);
    }

    /// Progress so far.
    pub fn progress(&self) -> Progress {
        Progress {
            round: self.report.rounds,
            resolved: self.results.len(),
            total: self.total,
        }
    }

    /// State of a target, or `None` for unknown URLs.
    pub fn state(&self, url: &str) -> Option<TargetState> {
        match self.results.get(url) {
            Some(TargetOutcome::Content(_)) => Some(TargetState::Succeeded),
            Some(TargetOutcome::Failed) => Some(TargetState::Failed),
            None if self.attempts.contains_key(url) => Some(TargetState::Pending),
            None => None,
        }
    }

    /// Failed attempts recorded for a target.
    pub fn attempts(&self, url: &str) -> Option<usize> {
        self.attempts.get(url).copied()
    }

    /// Counters for the run so far.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// The proxy pool in its current state.
    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }
}

fn validate_targets(targets: Vec<impl Into<String>>) -> Result<Vec<String>, Error> {
    let targets: Vec<String> = targets.into_iter().map(Into::into).collect();

    let mut seen = HashSet::new();
    for target in &targets {
        if !seen.insert(target.as_str()) {
            return Err(Error::DuplicateTarget(target.clone()));
        }
    }

    for target in &targets {
        Url::parse(target).map_err(|e| Error::InvalidTarget {
            url: target.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(targets)
}
