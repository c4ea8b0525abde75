use reqwest_proxy_rotator::{
    CandidateSource, HtmlTableSource, ProxyQuality, SourceError, SourceRetryPolicy, UserAgentTable,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Listing page in the free-proxy-list layout, padded past the challenge threshold.
fn listing_page(rows: &[(&str, &str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(ip, port, quality)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>GB</td><td>United Kingdom</td><td>{}</td><td>no</td><td>yes</td><td>10 secs ago</td></tr>",
                ip, port, quality
            )
        })
        .collect();

    format!(
        r#"<html><head><title>Free Proxy List</title></head><body>
        <p>{}</p>
        <div class="table-responsive"><table class="table">
        <thead><tr><th>IP Address</th><th>Port</th><th>Code</th><th>Country</th><th>Anonymity</th><th>Google</th><th>Https</th><th>Last Checked</th></tr></thead>
        <tbody>{}</tbody>
        </table></div></body></html>"#,
        "Updated every 10 minutes. ".repeat(250),
        rows
    )
}

fn quick_policy() -> SourceRetryPolicy {
    SourceRetryPolicy {
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        max_elapsed: Duration::from_millis(300),
        request_timeout: Duration::from_secs(2),
        min_page_bytes: 5000,
    }
}

fn source() -> HtmlTableSource {
    HtmlTableSource::new(quick_policy(), Arc::new(UserAgentTable::default()), Some(1))
        .expect("client should build")
}

#[tokio::test]
async fn test_scrapes_listing_table() {
    let server = MockServer::start().await;
    let page = listing_page(&[
        ("51.1.1.1", "8080", "elite proxy"),
        ("51.2.2.2", "3128", "anonymous"),
        ("51.3.3.3", "80", "transparent"),
    ]);
    Mock::given(method("GET"))
        .and(path("/uk-proxy.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html; charset=utf-8"))
        .mount(&server)
        .await;

    let proxies = assert_ok!(source().fetch(&format!("{}/uk-proxy.html", server.uri())).await);

    assert_eq!(proxies.len(), 3);
    let elite = proxies.iter().find(|p| p.host == "51.1.1.1").unwrap();
    assert_eq!(elite.port, "8080");
    assert_eq!(elite.quality, ProxyQuality::Elite);
}

#[tokio::test]
async fn test_retries_past_challenge_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>checking your browser</html>", "text/html"),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(listing_page(&[("52.1.1.1", "8000", "elite proxy")]), "text/html"),
        )
        .mount(&server)
        .await;

    let proxies = assert_ok!(source().fetch(&server.uri()).await);

    assert_eq!(proxies.len(), 1);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
    assert!(received.iter().all(|r| r.headers.contains_key("user-agent")));
}

#[tokio::test]
async fn test_gives_up_on_non_html() {
    let server = MockServer::start().await;
    let body = format!("{{\"padding\": \"{}\"}}", "x".repeat(6000));
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let result = source().fetch(&server.uri()).await;

    match result {
        Err(SourceError::GaveUp { attempts, last, .. }) => {
            assert!(attempts >= 2);
            assert!(last.contains("content type"));
        }
        other => panic!("expected GaveUp, got {:?}", other.map(|p| p.len())),
    }
}

#[tokio::test]
async fn test_page_without_table_is_parse_error() {
    let server = MockServer::start().await;
    let body = format!("<html><body><p>{}</p></body></html>", "maintenance ".repeat(600));
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let error = assert_err!(source().fetch(&server.uri()).await);

    assert!(matches!(error, SourceError::Parse(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ignores_proxy_from_environment() {
    let env_proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(listing_page(&[("53.1.1.1", "8080", "elite proxy")]), "text/html"),
        )
        .mount(&env_proxy)
        .await;
    std::env::set_var("HTTP_PROXY", env_proxy.uri());
    std::env::set_var("http_proxy", env_proxy.uri());

    // Built after the variables are set, so a client honouring them would route through env_proxy.
    let result = source().fetch("http://listing.invalid/").await;

    std::env::remove_var("HTTP_PROXY");
    std::env::remove_var("http_proxy");

    assert!(result.is_err());
    assert!(env_proxy.received_requests().await.unwrap().is_empty());
}
