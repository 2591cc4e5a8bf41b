use grocery_harvest::crawler::{FetchRequest, FetchResult, ProxyRotator, ResilientFetcher, RetryPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DELAY: Duration = Duration::from_millis(50);

fn fetcher(base: &str, policy: RetryPolicy) -> ResilientFetcher {
    ResilientFetcher::new(
        base,
        Duration::from_secs(5),
        Arc::new(ProxyRotator::direct()),
        policy,
    )
    .expect("Failed to build fetcher")
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::unbounded(DELAY, DELAY)
}

#[tokio::test]
async fn test_missing_page_is_terminal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = fetcher(&server.uri(), fast_policy()).get("/gone").await;

    assert_eq!(result, FetchResult::Terminal { status_code: 404 });
    assert!(result.content().is_none());
}

#[tokio::test]
async fn test_moved_permanently_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new"))
        .expect(0)
        .mount(&server)
        .await;

    let result = fetcher(&server.uri(), fast_policy()).get("/old").await;
    assert_eq!(result, FetchResult::Terminal { status_code: 301 });
}

#[tokio::test]
async fn test_other_redirects_are_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/temp"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/target"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/target"))
        .respond_with(ResponseTemplate::new(200).set_body_string("arrived"))
        .mount(&server)
        .await;

    let result = fetcher(&server.uri(), fast_policy()).get("/temp").await;
    assert_eq!(result.content(), Some("arrived"));
}

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = fetcher(&server.uri(), fast_policy()).get("/flaky").await;

    assert_eq!(
        result,
        FetchResult::Success {
            status_code: 200,
            content: "<html>ok</html>".to_string()
        }
    );
    assert!(started.elapsed() >= DELAY * 2);
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(3));
}

#[tokio::test]
async fn test_bounded_policy_reports_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let result = fetcher(&server.uri(), fast_policy().with_max_attempts(3))
        .get("/down")
        .await;

    assert_eq!(
        result,
        FetchResult::Exhausted {
            attempts: 3,
            last_status: Some(503)
        }
    );
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_network_errors_use_error_delay() {
    // Nothing listens on the port once the server is dropped
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let policy = RetryPolicy::unbounded(Duration::from_secs(60), DELAY).with_max_attempts(2);
    let started = Instant::now();
    let result = fetcher(&uri, policy).get("/").await;

    assert!(matches!(
        result,
        FetchResult::Exhausted {
            attempts: 2,
            last_status: None
        }
    ));
    assert!(started.elapsed() >= DELAY);
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test]
async fn test_cookies_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/store"))
        .and(header("cookie", "PHPSESSID=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("with session"))
        .expect(1)
        .mount(&server)
        .await;

    let request = FetchRequest::get("/store")
        .with_cookies(&[("PHPSESSID".to_string(), "abc123".to_string())]);
    let result = fetcher(&server.uri(), fast_policy()).fetch(&request).await;

    assert_eq!(result.content(), Some("with session"));
}

#[tokio::test]
async fn test_post_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_string_contains("q=lait"))
        .respond_with(ResponseTemplate::new(200).set_body_string("results"))
        .expect(1)
        .mount(&server)
        .await;

    let request = FetchRequest::post("/search", vec![("q".to_string(), "lait".to_string())]);
    let result = fetcher(&server.uri(), fast_policy()).fetch(&request).await;

    assert_eq!(result.content(), Some("results"));
}
