//! Single fetch attempts through a proxy.

use crate::identity::Identity;
use crate::middleware::IdentityMiddleware;
use crate::proxy::ProxyEndpoint;

use async_trait::async_trait;
use log::debug;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::time::Duration;

/// Result of one attempt. `content` is `None` whenever the attempt failed.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Proxy the attempt went through.
    pub proxy: ProxyEndpoint,
    /// Target that was requested.
    pub url: String,
    /// Raw body on success.
    pub content: Option<String>,
}

impl FetchOutcome {
    /// An attempt that produced nothing.
    pub fn failed(proxy: ProxyEndpoint, url: impl Into<String>) -> Self {
        Self {
            proxy,
            url: url.into(),
            content: None,
        }
    }
}

/// Performs exactly one GET through a proxy. Never fails; failures are
/// reported as an outcome without content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` through `proxy`, presenting `identity`.
    async fn fetch(
        &self,
        url: &str,
        proxy: &ProxyEndpoint,
        identity: &Identity,
        timeout: Duration,
    ) -> FetchOutcome;
}

/// Fetcher backed by reqwest, building one client per proxy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    verify_tls: bool,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(verify_tls: bool) -> Self {
        Self { verify_tls }
    }

    fn client(&self, proxy: &ProxyEndpoint, timeout: Duration) -> Result<ClientWithMiddleware, reqwest::Error> {
        let client = reqwest::Client::builder()
            .proxy(proxy.to_reqwest_proxy()?)
            .timeout(timeout)
            .danger_accept_invalid_certs(!self.verify_tls)
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(ClientBuilder::new(client).with(IdentityMiddleware).build())
    }

    async fn try_fetch(
        &self,
        url: &str,
        proxy: &ProxyEndpoint,
        identity: &Identity,
        timeout: Duration,
    ) -> Result<String, reqwest_middleware::Error> {
        let client = self.client(proxy, timeout)?;
        let response = client
            .get(url)
            .with_extension(identity.clone())
            .send()
            .await?;

        Ok(response.text().await?)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        proxy: &ProxyEndpoint,
        identity: &Identity,
        timeout: Duration,
    ) -> FetchOutcome {
        match self.try_fetch(url, proxy, identity, timeout).await {
            Ok(content) => FetchOutcome {
                proxy: proxy.clone(),
                url: url.to_string(),
                content: Some(content),
            },
            Err(e) => {
                debug!("Fetch of {} through {} failed: {}", url, proxy.key(), e);
                FetchOutcome::failed(proxy.clone(), url)
            }
        }
    }
}
