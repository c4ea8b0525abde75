//! # reqwest-proxy-rotator
//!
//! Fetch a fixed set of pages through a rotating pool of free anonymizing proxies.
//!
//! The pool is scraped from public proxy listing pages, filtered by anonymity
//! tier, deduplicated and shuffled. A [`Rotator`] then fetches every target
//! through the pool in rounds, evicting proxies that fail, refilling the pool
//! when it runs low, and giving up on a target once its attempt budget is spent.

pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod rotator;
pub mod source;
pub mod worker;

pub use config::{RotatorConfig, RotatorConfigBuilder, SourceRetryPolicy, DEFAULT_SOURCES};
pub use error::{Error, SourceError};
pub use identity::{Identity, IdentitySampler, UserAgentTable};
pub use middleware::IdentityMiddleware;
pub use pool::{ProxyPool, QualityFilter};
pub use proxy::{ProxyEndpoint, ProxyQuality};
pub use rotator::{
    LogProgress, Progress, ProgressObserver, Rotator, RunReport, TargetOutcome, TargetState,
    FAILURE_SENTINEL,
};
pub use source::{parse_proxy_table, CandidateSource, HtmlTableSource};
pub use worker::{FetchOutcome, Fetcher, HttpFetcher};
