//! Per-attempt client identities.

use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

/// Headers presented to the remote server on a single attempt.
///
/// Identities are resampled for every attempt and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Value of the `X-Forwarded-For` header.
    pub forwarded_for: String,
}

/// Source of identities.
pub trait IdentitySampler: Send + Sync {
    /// Draw one identity using the supplied random source.
    fn sample(&self, rng: &mut dyn RngCore) -> Identity;
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.144 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64; Trident/7.0; rv:11.0) like Gecko",
];

/// Samples a user agent uniformly from a fixed table and a random
/// IPv4 address for `X-Forwarded-For`.
#[derive(Debug, Clone)]
pub struct UserAgentTable {
    agents: Vec<String>,
}

impl UserAgentTable {
    /// Create a sampler over the given agents.
    ///
    /// An empty list falls back to the built-in table.
    pub fn new(agents: Vec<impl Into<String>>) -> Self {
        let agents: Vec<String> = agents.into_iter().map(Into::into).collect();
        if agents.is_empty() {
            return Self::default();
        }
        Self { agents }
    }

    /// Number of agents in the table.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the table is empty. Always false once constructed.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentTable {
    fn default() -> Self {
        Self {
            agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IdentitySampler for UserAgentTable {
    fn sample(&self, rng: &mut dyn RngCore) -> Identity {
        let user_agent = self
            .agents
            .choose(&mut *rng)
            .cloned()
            .unwrap_or_else(|| USER_AGENTS[0].to_string());
        let forwarded_for = format!(
            "{}.{}.{}.{}",
            rng.random_range(1..=223u8),
            rng.random_range(0..=255u8),
            rng.random_range(0..=255u8),
            rng.random_range(1..=254u8),
        );

        Identity {
            user_agent,
            forwarded_for,
        }
    }
}
