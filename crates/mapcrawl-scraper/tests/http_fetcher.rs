//! Integration tests for `HttpTileFetcher`.
//!
//! Uses `wiremock` to stand in for the provider so no real network traffic is
//! made. Covers page splitting end to end plus every status the fetcher maps
//! to a typed error.

use std::time::Duration;

use wiremock::matchers::{method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mapcrawl_scraper::{GridPoint, HttpTileFetcher, ScraperError, TileFetcher};

const TILE: GridPoint = GridPoint {
    lat: 12.9716,
    lng: 77.5946,
};

/// No retries, 5-second request timeout.
fn test_fetcher(base: &str) -> HttpTileFetcher {
    HttpTileFetcher::new(base, "mapcrawl-test/0.1", 5, 0, 0).expect("failed to build test fetcher")
}

fn results_page() -> String {
    r#"<html><body><div role="feed">
<div role="article"><a aria-label="Cafe Coffee Day" href="https://www.google.com/maps/place/CCD/data=!3d12.97!4d77.59"></a>
<span>4.1(2,310)</span><span>₹400 for two</span></div>
<div role="article"><a aria-label="Third Wave Coffee" href="https://www.google.com/maps/place/TWC/data=!3d12.98!4d77.60"></a>
<span>4.5(880)</span></div>
</div></body></html>"#
        .to_owned()
}

#[tokio::test]
async fn fetch_splits_rendered_results_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/maps/search/filter\+coffee/@12\.9716000,77\.5946000,14z$"))
        .and(query_param("hl", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
        .expect(1)
        .mount(&server)
        .await;

    let entries = test_fetcher(&server.uri())
        .fetch("filter coffee", TILE, 14.0)
        .await
        .expect("fetch should succeed");

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].label.as_deref(), Some("Cafe Coffee Day"));
    assert!(entries[0].text.contains("4.1(2,310)"));
    assert_eq!(entries[1].label.as_deref(), Some("Third Wave Coffee"));
}

#[tokio::test]
async fn fetch_returns_empty_for_page_without_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/maps/search/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>No results</body></html>"),
        )
        .mount(&server)
        .await;

    let result = test_fetcher(&server.uri()).fetch("cafe", TILE, 14.0).await;

    assert!(
        matches!(result, Ok(ref entries) if entries.is_empty()),
        "expected Ok(empty), got: {result:?}"
    );
}

#[tokio::test]
async fn fetch_maps_429_to_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = test_fetcher(&server.uri()).fetch("cafe", TILE, 14.0).await;

    assert!(
        matches!(result, Err(ScraperError::RateLimited { .. })),
        "expected RateLimited, got: {result:?}"
    );
}

#[tokio::test]
async fn fetch_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpTileFetcher::new(&server.uri(), "mapcrawl-test/0.1", 5, 3, 0)
        .expect("failed to build test fetcher");
    let result = fetcher.fetch("cafe", TILE, 14.0).await;

    assert!(
        matches!(result, Err(ScraperError::UnexpectedStatus { status: 403, .. })),
        "expected UnexpectedStatus(403), got: {result:?}"
    );
}

#[tokio::test]
async fn fetch_retries_server_error_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpTileFetcher::new(&server.uri(), "mapcrawl-test/0.1", 5, 2, 0)
        .expect("failed to build test fetcher");
    let entries = fetcher
        .fetch("cafe", TILE, 14.0)
        .await
        .expect("second attempt should succeed");

    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn fetch_times_out_when_provider_never_answers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpTileFetcher::new(&server.uri(), "mapcrawl-test/0.1", 1, 0, 0)
        .expect("failed to build test fetcher");
    let result = fetcher.fetch("cafe", TILE, 14.0).await;

    assert!(
        matches!(result, Err(ScraperError::Timeout { secs: 1, .. })),
        "expected Timeout, got: {result:?}"
    );
}
