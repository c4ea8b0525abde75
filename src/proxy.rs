//! Proxy endpoint representation.

use std::fmt;

/// Anonymity tier reported by a proxy listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyQuality {
    /// Strips identifying headers entirely.
    Elite,
    /// Hides the client IP but announces itself as a proxy.
    Anonymous,
    /// Forwards the client IP. Never usable.
    Transparent,
}

impl ProxyQuality {
    /// Derive the tier from the anonymity column of a listing table.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("elite proxy") {
            ProxyQuality::Elite
        } else if label.eq_ignore_ascii_case("transparent") {
            ProxyQuality::Transparent
        } else {
            ProxyQuality::Anonymous
        }
    }
}

impl fmt::Display for ProxyQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyQuality::Elite => write!(f, "elite"),
            ProxyQuality::Anonymous => write!(f, "anonymous"),
            ProxyQuality::Transparent => write!(f, "transparent"),
        }
    }
}

/// A proxy scraped from a listing page.
///
/// Two endpoints are the same proxy when their `host:port` keys match,
/// regardless of the quality each listing reported.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    /// IP address or host name of the proxy.
    pub host: String,
    /// Port, kept as listed.
    pub port: String,
    /// Anonymity tier.
    pub quality: ProxyQuality,
}

impl ProxyEndpoint {
    /// Create a new endpoint.
    pub fn new(host: impl Into<String>, port: impl Into<String>, quality: ProxyQuality) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            quality,
        }
    }

    /// The uniqueness key, `host:port`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The proxy URL used for both plain and TLS targets.
    pub fn url(&self) -> String {
        format!("http://{}", self.key())
    }

    /// Convert the endpoint to a reqwest::Proxy covering all schemes.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        reqwest::Proxy::all(self.url())
    }
}

impl PartialEq for ProxyEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for ProxyEndpoint {}

impl std::hash::Hash for ProxyEndpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key(), self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_quality_from_label() {
        assert_eq!(ProxyQuality::from_label("elite proxy"), ProxyQuality::Elite);
        assert_eq!(ProxyQuality::from_label(" Elite Proxy "), ProxyQuality::Elite);
        assert_eq!(ProxyQuality::from_label("transparent"), ProxyQuality::Transparent);
        assert_eq!(ProxyQuality::from_label("anonymous"), ProxyQuality::Anonymous);
        assert_eq!(ProxyQuality::from_label(""), ProxyQuality::Anonymous);
    }

    #[test]
    fn test_endpoint_identity_ignores_quality() {
        let a = ProxyEndpoint::new("10.1.1.1", "8080", ProxyQuality::Elite);
        let b = ProxyEndpoint::new("10.1.1.1", "8080", ProxyQuality::Anonymous);
        let c = ProxyEndpoint::new("10.1.1.1", "3128", ProxyQuality::Elite);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a.key(), "10.1.1.1:8080");
        assert_eq!(a.url(), "http://10.1.1.1:8080");
    }

    #[test]
    fn test_to_reqwest_proxy() {
        let endpoint = ProxyEndpoint::new("127.0.0.1", "3128", ProxyQuality::Elite);
        assert!(endpoint.to_reqwest_proxy().is_ok());
    }
}
