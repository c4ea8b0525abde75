//! Middleware that presents a per-attempt identity to the target server.

use crate::identity::Identity;

use anyhow::anyhow;
use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue, USER_AGENT};
use reqwest_middleware::{Error, Middleware, Next, Result};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Stamps the [`Identity`] found in the request extensions onto the request
/// as `User-Agent` and `X-Forwarded-For` headers.
///
/// Requests without an identity pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct IdentityMiddleware;

#[async_trait]
impl Middleware for IdentityMiddleware {
    async fn handle(
        &self,
        mut req: reqwest::Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<reqwest::Response> {
        if let Some(identity) = extensions.get::<Identity>() {
            let user_agent = header_value("User-Agent", &identity.user_agent)?;
            let forwarded_for = header_value("X-Forwarded-For", &identity.forwarded_for)?;

            let headers = req.headers_mut();
            headers.insert(USER_AGENT, user_agent);
            headers.insert(X_FORWARDED_FOR, forwarded_for);
        }

        next.run(req, extensions).await
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Middleware(anyhow!("Invalid {} header {:?}: {}", name, value, e)))
}
