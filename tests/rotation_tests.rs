use reqwest_proxy_rotator::{
    Fetcher, HtmlTableSource, HttpFetcher, Identity, ProxyEndpoint, ProxyQuality, Rotator,
    RotatorConfig, SourceRetryPolicy, TargetOutcome, UserAgentTable,
};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use wiremock::matchers::{header, header_exists, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn identity() -> Identity {
    Identity {
        user_agent: "rotation-test/1.0".to_string(),
        forwarded_for: "203.0.113.7".to_string(),
    }
}

/// A local port with nothing listening on it.
fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Endpoint pointing at a mock server, which then plays the proxy.
fn proxy_for(server: &MockServer) -> ProxyEndpoint {
    let address = server.address();
    ProxyEndpoint::new(address.ip().to_string(), address.port().to_string(), ProxyQuality::Elite)
}

#[tokio::test]
async fn test_fetch_through_proxy_sends_identity() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "rotation-test/1.0"))
        .and(header("x-forwarded-for", "203.0.113.7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
        .mount(&proxy)
        .await;

    let outcome = HttpFetcher::new(true)
        .fetch(
            "http://target.test/page",
            &proxy_for(&proxy),
            &identity(),
            Duration::from_secs(2),
        )
        .await;

    assert_eq!(outcome.url, "http://target.test/page");
    assert_eq!(outcome.content.as_deref(), Some("<html>hello</html>"));
}

#[tokio::test]
async fn test_fetch_keeps_body_of_error_status() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&proxy)
        .await;

    let outcome = HttpFetcher::default()
        .fetch("http://target.test/", &proxy_for(&proxy), &identity(), Duration::from_secs(2))
        .await;

    assert_eq!(outcome.content.as_deref(), Some("not here"));
}

#[tokio::test]
async fn test_fetch_through_dead_proxy_reports_no_content() {
    let dead = ProxyEndpoint::new("127.0.0.1", dead_port().to_string(), ProxyQuality::Elite);

    let outcome = HttpFetcher::new(true)
        .fetch("http://target.test/", &dead, &identity(), Duration::from_secs(2))
        .await;

    assert_eq!(outcome.proxy, dead);
    assert!(outcome.content.is_none());
}

#[tokio::test]
async fn test_rotator_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();

    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("x-forwarded-for"))
        .respond_with(ResponseTemplate::new(200).set_body_string("p".repeat(40_000)))
        .mount(&proxy)
        .await;

    let live = proxy.address();
    let listing = MockServer::start().await;
    let rows = format!(
        "<tr><td>{}</td><td>{}</td><td>US</td><td>United States</td><td>elite proxy</td><td>no</td><td>no</td><td>1 min ago</td></tr>\
         <tr><td>127.0.0.1</td><td>{}</td><td>US</td><td>United States</td><td>elite proxy</td><td>no</td><td>no</td><td>1 min ago</td></tr>\
         <tr><td>10.9.9.9</td><td>3128</td><td>US</td><td>United States</td><td>transparent</td><td>no</td><td>no</td><td>1 min ago</td></tr>",
        live.ip(),
        live.port(),
        dead_port()
    );
    let page = format!(
        "<html><body><p>{}</p><div class=\"table-responsive\"><table><tbody>{}</tbody></table></div></body></html>",
        "Fresh proxies every ten minutes. ".repeat(200),
        rows
    );
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html"))
        .mount(&listing)
        .await;

    let policy = SourceRetryPolicy {
        initial_backoff: Duration::from_millis(10),
        max_elapsed: Duration::from_secs(2),
        ..SourceRetryPolicy::default()
    };
    let config = RotatorConfig::builder()
        .sources(vec![listing.uri()])
        .source_retry(policy.clone())
        .request_timeout(Duration::from_secs(2))
        .result_timeout(Duration::from_secs(3))
        .low_water_mark(0)
        .max_attempts(3)
        .seed(3)
        .build();
    let sampler = Arc::new(UserAgentTable::default());
    let source = HtmlTableSource::new(policy, sampler.clone(), Some(4)).unwrap();

    let mut rotator = Rotator::with_parts(
        vec!["http://a.test/", "http://b.test/"],
        config,
        Arc::new(source),
        Arc::new(HttpFetcher::new(true)),
        sampler,
    )
    .unwrap();

    let results = assert_ok!(rotator.run().await);

    assert_eq!(results.len(), 2);
    for outcome in results.values() {
        match outcome {
            TargetOutcome::Content(body) => assert_eq!(body.len(), 40_000),
            TargetOutcome::Failed => panic!("the live proxy should have served every target"),
        }
    }
    // The transparent proxy never enters the pool and the dead one is evicted.
    assert_eq!(rotator.pool().len(), 1);
}
