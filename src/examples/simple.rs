//! Simple example of using reqwest-proxy-rotator.

use reqwest_proxy_rotator::{Rotator, RotatorConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let targets = vec![
        "https://httpbin.org/html",
        "https://httpbin.org/headers",
    ];

    let config = RotatorConfig::builder()
        // small pages are fine here, so don't apply the captcha size filter
        .incognito(false)
        .worker_count(8)
        .request_timeout(Duration::from_secs(5))
        .result_timeout(Duration::from_secs(6))
        .max_attempts(5)
        .build();

    println!("Fetching {} targets through free proxies...", targets.len());
    let mut rotator = Rotator::new(targets, config)?;
    let results = rotator.run().await?;

    for (url, outcome) in &results {
        let text = outcome.as_text();
        let preview: String = text.chars().take(80).collect();
        println!("{} -> {} bytes: {}", url, text.len(), preview);
    }
    println!("{:?}", rotator.report());

    Ok(())
}
