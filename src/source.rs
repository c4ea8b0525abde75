//! Scraping proxy candidates from public listing pages.

use crate::config::SourceRetryPolicy;
use crate::error::SourceError;
use crate::identity::IdentitySampler;
use crate::proxy::{ProxyEndpoint, ProxyQuality};

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Cells per table row: ip, port, code, country, anonymity, google, https, last checked.
const CELLS_PER_ROW: usize = 8;
const IP_CELL: usize = 0;
const PORT_CELL: usize = 1;
const QUALITY_CELL: usize = 4;

/// Something that turns a listing URL into proxy candidates.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Fetch the listing at `source_url` and extract its proxies.
    async fn fetch(&self, source_url: &str) -> Result<HashSet<ProxyEndpoint>, SourceError>;
}

/// Scrapes free-proxy-list style HTML tables, fetched directly without a proxy.
pub struct HtmlTableSource {
    client: Client,
    sampler: Arc<dyn IdentitySampler>,
    policy: SourceRetryPolicy,
    rng: Mutex<StdRng>,
}

impl HtmlTableSource {
    /// Create a new source. A seed makes the identity sequence reproducible.
    pub fn new(
        policy: SourceRetryPolicy,
        sampler: Arc<dyn IdentitySampler>,
        seed: Option<u64>,
    ) -> Result<Self, reqwest::Error> {
        // Listing pages are always fetched directly, never through a system proxy.
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .no_proxy()
            .build()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            client,
            sampler,
            policy,
            rng: Mutex::new(rng),
        })
    }

    /// Fetch one listing page and check it is a real page.
    async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
        let identity = {
            let mut rng = self.rng.lock();
            self.sampler.sample(&mut *rng)
        };

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, identity.user_agent)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        // A response without Content-Type is let through to the size check.
        if let Some(content_type) = content_type {
            if !content_type.contains("html") && !content_type.contains("text") {
                return Err(SourceError::Rejected(format!(
                    "unexpected content type {}",
                    content_type
                )));
            }
        }

        let body = response.text().await?;
        if body.len() < self.policy.min_page_bytes {
            return Err(SourceError::Rejected(format!(
                "challenge page suspected ({} bytes)",
                body.len()
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl CandidateSource for HtmlTableSource {
    async fn fetch(&self, source_url: &str) -> Result<HashSet<ProxyEndpoint>, SourceError> {
        let started = Instant::now();
        let mut failures = 0;

        loop {
            match self.fetch_page(source_url).await {
                Ok(body) => {
                    let proxies = parse_proxy_table(&body)?;
                    info!("Scraped {} candidates from {}", proxies.len(), source_url);
                    return Ok(proxies);
                }
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    let backoff = self.policy.backoff(failures);
                    let elapsed = started.elapsed();
                    if elapsed + backoff > self.policy.max_elapsed {
                        return Err(SourceError::GaveUp {
                            url: source_url.to_string(),
                            attempts: failures,
                            elapsed,
                            last: e.to_string(),
                        });
                    }

                    debug!(
                        "Listing {} failed (attempt {}): {}, retrying in {:?}",
                        source_url, failures, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Extract proxies from a listing page.
///
/// Cells are read from the responsive table container when present, from any
/// table otherwise, and grouped eight to a row.
pub fn parse_proxy_table(html: &str) -> Result<HashSet<ProxyEndpoint>, SourceError> {
    let doc = Html::parse_document(html);

    let mut cells = select_cells(&doc, "div.table-responsive table tr td")?;
    if cells.is_empty() {
        cells = select_cells(&doc, "table tr td")?;
    }
    if cells.is_empty() {
        return Err(SourceError::Parse("no proxy table found".to_string()));
    }

    let proxies = cells
        .chunks_exact(CELLS_PER_ROW)
        .filter_map(|row| {
            let host = &row[IP_CELL];
            let port = &row[PORT_CELL];
            if host.is_empty() || port.parse::<u16>().is_err() {
                return None;
            }
            Some(ProxyEndpoint::new(
                host.clone(),
                port.clone(),
                ProxyQuality::from_label(&row[QUALITY_CELL]),
            ))
        })
        .collect();

    Ok(proxies)
}

fn select_cells(doc: &Html, selector: &str) -> Result<Vec<String>, SourceError> {
    let selector = Selector::parse(selector).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(doc
        .select(&selector)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect())
}
