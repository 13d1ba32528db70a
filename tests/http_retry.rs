//! Integration tests for bounded retry on rate limiting and network failure.
//!
//! These tests run the client against a mock server that answers 429, or a
//! local listener that drops connections.

use std::sync::atomic::Ordering;
use std::time::Duration;

use offline_library_core::{ApiClient, ErrorKind, FetchError, HttpTimeouts, RetryPolicy, WaitCountdown};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::{closed_port_url, start_flaky_server_or_skip, start_mock_server_or_skip};

fn fast_client(max_attempts: u32) -> ApiClient {
    ApiClient::new(
        RetryPolicy::new(max_attempts, Duration::from_millis(10)),
        HttpTimeouts::default(),
    )
    .expect("client should build")
}

#[tokio::test]
async fn test_rate_limited_three_times_then_success_takes_four_attempts() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/api/resources/en/0"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/resources/en/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 1}])))
        .mount(&mock_server)
        .await;

    let client = fast_client(5);
    let url = format!("{}/api/resources/en/0", mock_server.uri());
    let items: Vec<serde_json::Value> = client.fetch_json(&url, None).await.unwrap();

    assert_eq!(items.len(), 1);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4, "three 429s plus the successful attempt");
}

#[tokio::test]
async fn test_always_rate_limited_gives_up_after_max_attempts() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&mock_server)
        .await;

    let client = fast_client(5);
    let url = format!("{}/api/resources/en/0", mock_server.uri());
    let err = client
        .fetch_json::<Vec<serde_json::Value>>(&url, None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, FetchError::RateLimited { attempts: 5, .. }),
        "expected RateLimited after 5 attempts, got {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::RateLimited);
}

#[tokio::test]
async fn test_fetch_with_retry_uses_explicit_attempt_budget() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = fast_client(5);
    let url = format!("{}/api/resource_attributes/9", mock_server.uri());
    let err = client
        .fetch_with_retry::<serde_json::Value>(&url, 2, None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::RateLimited { attempts: 2, .. }));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(5);
    let url = format!("{}/api/resource/getFile/1", mock_server.uri());
    let err = client.fetch_bytes(&url, None).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.kind(), ErrorKind::Http);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(5);
    let url = format!("{}/api/resources/en/0", mock_server.uri());
    let err = client.fetch_bytes(&url, None).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_invalid_json_is_a_decode_error() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let client = fast_client(5);
    let url = format!("{}/api/resources/en/0", mock_server.uri());
    let err = client
        .fetch_json::<Vec<serde_json::Value>>(&url, None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_countdown_reports_wait_then_returns_to_zero() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(
        RetryPolicy::new(5, Duration::from_millis(200)),
        HttpTimeouts::default(),
    )
    .unwrap();
    let countdown = WaitCountdown::new();
    let mut rx = countdown.subscribe();
    let url = format!("{}/api/resources/en/0", mock_server.uri());

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            seen.push(value);
            if value.is_zero() {
                break;
            }
        }
        seen
    });

    let items: Vec<serde_json::Value> = client.fetch_json(&url, Some(&countdown)).await.unwrap();
    assert!(items.is_empty());

    let seen = tokio::time::timeout(Duration::from_secs(5), watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.first(), Some(&Duration::from_millis(200)));
    assert_eq!(seen.last(), Some(&Duration::ZERO));
    assert_eq!(countdown.remaining(), Duration::ZERO);
}

fn network_retry_client(network_retries: u32) -> ApiClient {
    ApiClient::new(
        RetryPolicy::new(5, Duration::from_millis(10))
            .with_network_retries(network_retries)
            .with_network_backoff(Duration::from_millis(1), Duration::from_millis(5)),
        HttpTimeouts::default(),
    )
    .expect("client should build")
}

#[tokio::test]
async fn test_refused_connection_is_a_network_error() {
    let Some(url) = closed_port_url() else {
        return;
    };

    let err = fast_client(5)
        .fetch_json::<Vec<serde_json::Value>>(&url, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_dropped_connection_is_not_retried_by_default() {
    let Some(server) = start_flaky_server_or_skip(usize::MAX).await else {
        return;
    };

    let err = fast_client(5)
        .fetch_json::<Vec<serde_json::Value>>(&server.url, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(server.accepted.load(Ordering::SeqCst), 1, "exactly one attempt");
}

#[tokio::test]
async fn test_network_retries_recover_from_dropped_connections() {
    let Some(server) = start_flaky_server_or_skip(2).await else {
        return;
    };

    let items: Vec<serde_json::Value> = network_retry_client(2)
        .fetch_json(&server.url, None)
        .await
        .unwrap();

    assert!(items.is_empty());
    assert_eq!(server.accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_network_retries_are_bounded() {
    let Some(server) = start_flaky_server_or_skip(usize::MAX).await else {
        return;
    };

    let err = network_retry_client(2)
        .fetch_json::<Vec<serde_json::Value>>(&server.url, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(server.accepted.load(Ordering::SeqCst), 3, "one attempt plus two retries");
}
