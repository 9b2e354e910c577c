//! Integration tests for the resilient fetcher

use event_harvester::config::FetcherConfig;
use event_harvester::crawler::{FetchError, Fetcher};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn fast_config(max_tries: u32) -> FetcherConfig {
    FetcherConfig {
        max_tries,
        base_sleep_ms: 1,
        max_sleep_ms: 5,
        timeout_secs: 5,
        ..FetcherConfig::default()
    }
}

/// Fails with the given status `failures` times, then serves `body`
struct FlakyResponder {
    calls: AtomicUsize,
    failures: usize,
    status: u16,
    body: &'static str,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            ResponseTemplate::new(self.status).insert_header("retry-after", "0")
        } else {
            ResponseTemplate::new(200).set_body_string(self.body)
        }
    }
}

#[tokio::test]
async fn test_success_sends_configured_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = fast_config(3);
    let fetcher = Fetcher::new(&config).unwrap();
    let body = fetcher
        .fetch(&format!("{}/page", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(body, "hello");

    let requests = mock_server.received_requests().await.unwrap();
    let header = |name: &str| {
        requests[0]
            .headers
            .iter()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, values)| values.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(","))
    };
    assert_eq!(header("accept-language").as_deref(), Some("ru,en;q=0.8"));
    assert_eq!(header("user-agent"), Some(config.user_agent.clone()));
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(FlakyResponder {
            calls: AtomicUsize::new(0),
            failures: 2,
            status: 429,
            body: "finally",
        })
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fast_config(6)).unwrap();
    let body = fetcher
        .fetch(&format!("{}/page", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(body, "finally");
}

#[tokio::test]
async fn test_server_error_then_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(FlakyResponder {
            calls: AtomicUsize::new(0),
            failures: 1,
            status: 502,
            body: "ok",
        })
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fast_config(3)).unwrap();
    assert_eq!(fetcher.fetch(&mock_server.uri()).await.unwrap(), "ok");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fast_config(6)).unwrap();
    let err = fetcher.fetch(&mock_server.uri()).await.unwrap_err();
    assert!(matches!(err, FetchError::ClientError { status: 404 }));
}

#[tokio::test]
async fn test_exhausted_carries_last_cause() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&fast_config(4)).unwrap();
    let err = fetcher.fetch(&mock_server.uri()).await.unwrap_err();

    match err {
        FetchError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last, FetchError::ServerError { status: 500 }));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_failure_is_network_error() {
    // Reserve a free port, then release it so nothing is listening there
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let fetcher = Fetcher::new(&fast_config(2)).unwrap();
    let err = fetcher.fetch(&format!("http://{}/page", addr)).await.unwrap_err();

    match err {
        FetchError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, FetchError::NetworkError { .. }));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_cuts_backoff_short() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = FetcherConfig {
        base_sleep_ms: 30_000,
        max_sleep_ms: 30_000,
        ..fast_config(5)
    };
    let token = CancellationToken::new();
    let fetcher = Fetcher::new(&config)
        .unwrap()
        .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = fetcher.fetch(&mock_server.uri()).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, FetchError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
}
