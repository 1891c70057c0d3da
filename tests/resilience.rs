//! Engine outage tests.
//!
//! A stub Elasticsearch served by axum answers every request with a canned
//! body, a 500, or a slow reply, so the HTTP client's timeout handling and
//! circuit breaker can be exercised without a real cluster.
//!
//! Run with: `cargo test --test resilience`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use search_gateway::engine::ElasticsearchClient;
use search_gateway::resilience::retry::retry;
use search_gateway::search::{Query, SearchRequest};
use search_gateway::{
    http, CircuitConfig, EngineError, GatewayConfig, RawParams, RetryConfig, SearchEngine,
    SearchGateway, SearchSurface,
};

// =============================================================================
// Stub engine
// =============================================================================

struct Stub {
    healthy: AtomicBool,
    delay: Duration,
    calls: AtomicU64,
}

fn canned() -> Value {
    json!({
        "status": "green",
        "cluster_name": "stub",
        "hits": {
            "total": {"value": 1},
            "hits": [{
                "_index": "government",
                "_type": "edition",
                "_id": "/vat-rates",
                "_score": 1.5,
                "_source": {"link": "/vat-rates", "title": "VAT rates", "format": "answer"}
            }]
        }
    })
}

async fn respond(State(stub): State<Arc<Stub>>) -> Response {
    stub.calls.fetch_add(1, Ordering::SeqCst);
    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }
    if stub.healthy.load(Ordering::SeqCst) {
        Json(canned()).into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "cluster unavailable").into_response()
    }
}

async fn start_stub(healthy: bool, delay: Duration) -> (String, Arc<Stub>) {
    let stub = Arc::new(Stub {
        healthy: AtomicBool::new(healthy),
        delay,
        calls: AtomicU64::new(0),
    });
    let app = Router::new().fallback(respond).with_state(stub.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    (format!("http://{addr}"), stub)
}

fn search_request() -> SearchRequest {
    SearchRequest::new(Query::match_all(), 10)
}

fn indexes() -> Vec<String> {
    vec!["government".to_string()]
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_search_through_http_client() {
    let (url, _stub) = start_stub(true, Duration::ZERO).await;
    let client = ElasticsearchClient::new(url, Duration::from_secs(2));
    let gateway = SearchGateway::new(GatewayConfig::default(), Arc::new(client)).unwrap();

    let response = gateway
        .search(SearchSurface::Government, &RawParams::from_query_string("q=vat&fields=link"))
        .await
        .unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.results[0]["link"], "/vat-rates");
}

#[tokio::test]
async fn test_timeout_is_engine_error_not_empty_result() {
    let (url, _stub) = start_stub(true, Duration::from_millis(500)).await;
    let client = ElasticsearchClient::new(url, Duration::from_millis(50));

    let err = client.search(&indexes(), &search_request()).await.unwrap_err();
    assert_eq!(err, EngineError::Timeout);
}

#[tokio::test]
async fn test_timeout_surfaces_as_503() {
    let (url, _stub) = start_stub(true, Duration::from_millis(500)).await;
    let client = ElasticsearchClient::new(url, Duration::from_millis(50));
    let gateway = SearchGateway::new(GatewayConfig::default(), Arc::new(client)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(http::serve(listener, Arc::new(gateway)));

    let response = reqwest::get(format!("http://{addr}/search.json?q=vat")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().await.unwrap(), "Elasticsearch timed out");
}

#[tokio::test]
async fn test_backend_error_keeps_status() {
    let (url, _stub) = start_stub(false, Duration::ZERO).await;
    let client = ElasticsearchClient::new(url, Duration::from_secs(2));

    let err = client.search(&indexes(), &search_request()).await.unwrap_err();
    assert!(matches!(err, EngineError::Backend { status: 500, .. }));
}

#[tokio::test]
async fn test_circuit_opens_then_recovers() {
    let (url, stub) = start_stub(false, Duration::ZERO).await;
    let client = ElasticsearchClient::with_circuit(url, Duration::from_secs(2), CircuitConfig::test());

    for _ in 0..5 {
        assert!(client.search(&indexes(), &search_request()).await.is_err());
    }
    assert!(client.circuit().rejections() >= 1);
    assert!(stub.calls.load(Ordering::SeqCst) < 5);

    let err = client.search(&indexes(), &search_request()).await.unwrap_err();
    assert_eq!(err, EngineError::Unavailable("circuit breaker open".into()));

    stub.healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(CircuitConfig::test().recovery_timeout * 2).await;

    let response = client.search(&indexes(), &search_request()).await.unwrap();
    assert_eq!(response.total, 1);
    assert!(client.search(&indexes(), &search_request()).await.is_ok());
}

#[tokio::test]
async fn test_unreachable_engine_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ElasticsearchClient::new(format!("http://{addr}"), Duration::from_secs(1));
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
}

#[tokio::test]
async fn test_startup_retry_gives_up() {
    let (url, stub) = start_stub(false, Duration::ZERO).await;
    let client = ElasticsearchClient::new(url, Duration::from_secs(1));

    let result = retry("engine health", &RetryConfig::test(), || client.health()).await;
    assert!(result.is_err());
    assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_startup_retry_succeeds_once_healthy() {
    let (url, stub) = start_stub(true, Duration::ZERO).await;
    let client = ElasticsearchClient::new(url, Duration::from_secs(1));

    let health = retry("engine health", &RetryConfig::test(), || client.health())
        .await
        .unwrap();
    assert_eq!(health.status, "green");
    assert_eq!(health.detail.as_deref(), Some("stub"));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}
