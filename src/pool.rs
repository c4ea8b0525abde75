//! Core proxy pool implementation.

use crate::error::Error;
use crate::proxy::{ProxyEndpoint, ProxyQuality};
use crate::source::CandidateSource;

use futures::future;
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Which proxies a refresh keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFilter {
    /// Keep only elite proxies.
    EliteOnly,
    /// Keep everything except transparent proxies.
    NonTransparent,
}

impl QualityFilter {
    /// The filter for strict (elite only) or relaxed mode.
    pub fn new(strict: bool) -> Self {
        if strict {
            QualityFilter::EliteOnly
        } else {
            QualityFilter::NonTransparent
        }
    }

    /// Whether a proxy of the given quality may be used.
    pub fn accepts(&self, quality: ProxyQuality) -> bool {
        match self {
            QualityFilter::EliteOnly => quality == ProxyQuality::Elite,
            QualityFilter::NonTransparent => quality != ProxyQuality::Transparent,
        }
    }
}

/// A deduplicated, shuffled set of proxies scraped from listing pages.
///
/// Proxies leave the pool only through [`evict`](Self::evict) or when a
/// refresh replaces the whole set.
pub struct ProxyPool {
    /// Current proxies, in randomized order.
    endpoints: Vec<ProxyEndpoint>,
    /// Scraper for listing pages.
    source: Arc<dyn CandidateSource>,
    /// Listing pages to scrape.
    sources: Vec<String>,
    /// Refreshes performed so far.
    refreshes: usize,
}

impl ProxyPool {
    /// Create an empty pool over the given listing pages.
    pub fn new(source: Arc<dyn CandidateSource>, sources: Vec<String>) -> Self {
        Self {
            endpoints: Vec::new(),
            source,
            sources,
            refreshes: 0,
        }
    }

    /// Scrape every listing page and return the usable proxies, deduplicated
    /// by `host:port` and uniformly shuffled.
    ///
    /// Nothing is cached: every call scrapes all pages again. A page that
    /// fails is logged and skipped.
    pub async fn scrape<R>(&self, strict: bool, rng: &mut R) -> Vec<ProxyEndpoint>
    where
        R: Rng + Send + ?Sized,
    {
        let filter = QualityFilter::new(strict);
        info!("Refreshing proxy pool from {} sources", self.sources.len());

        let fetches = self.sources.iter().map(|url| self.source.fetch(url));
        let results = future::join_all(fetches).await;

        let mut unique: HashSet<ProxyEndpoint> = HashSet::new();
        for (url, result) in self.sources.iter().zip(results) {
            match result {
                Ok(candidates) => {
                    let before = unique.len();
                    unique.extend(candidates.into_iter().filter(|p| filter.accepts(p.quality)));
                    info!("Kept {} new proxies from {}", unique.len() - before, url);
                }
                Err(e) => {
                    warn!("Failed to fetch proxies from {}: {}", url, e);
                }
            }
        }

        // Sort first so a seeded rng gives the same order on every run.
        let mut endpoints: Vec<ProxyEndpoint> = unique.into_iter().collect();
        endpoints.sort_by_key(ProxyEndpoint::key);
        endpoints.shuffle(rng);
        endpoints
    }

    /// Replace the pool with a fresh scrape. Returns the new size.
    pub async fn refresh<R>(&mut self, strict: bool, rng: &mut R) -> usize
    where
        R: Rng + Send + ?Sized,
    {
        self.endpoints = self.scrape(strict, rng).await;
        self.refreshes += 1;
        info!("Proxy pool refreshed: {} usable proxies", self.endpoints.len());
        self.endpoints.len()
    }

    /// Refresh until the pool is non-empty, giving up after `max_attempts`
    /// consecutive empty refreshes.
    pub async fn refresh_until_usable<R>(
        &mut self,
        strict: bool,
        max_attempts: usize,
        rng: &mut R,
    ) -> Result<usize, Error>
    where
        R: Rng + Send + ?Sized,
    {
        for attempt in 1..=max_attempts {
            let size = self.refresh(strict, &mut *rng).await;
            if size > 0 {
                return Ok(size);
            }
            warn!("Proxy refresh {}/{} produced no usable proxy", attempt, max_attempts);
        }

        Err(Error::ProxyExhaustion {
            attempts: max_attempts,
        })
    }

    /// Remove a proxy that failed. Returns whether it was present.
    pub fn evict(&mut self, endpoint: &ProxyEndpoint) -> bool {
        match self.endpoints.iter().position(|p| p == endpoint) {
            Some(index) => {
                self.endpoints.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current proxies in pool order.
    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    /// Number of refreshes performed since the pool was created.
    pub fn refresh_count(&self) -> usize {
        self.refreshes
    }

    /// Number of proxies in the pool.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
