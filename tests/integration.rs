//! Integration tests for the HTTP surface.
//!
//! Each test serves the router on an ephemeral port over an in-memory
//! engine and drives it with `reqwest`, so no external services are needed.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - searches, aggregates, best bets, batch, legacy search
//! - `failure_*` - validation errors and their status codes

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use search_gateway::best_bets::{bet_document, BestBet, BetEntry, QueryMatch, BEST_BET_TYPE};
use search_gateway::{http, GatewayConfig, InMemoryEngine, SearchGateway};

// =============================================================================
// Helpers
// =============================================================================

struct TestServer {
    base: String,
    engine: Arc<InMemoryEngine>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(engine: InMemoryEngine) -> Self {
        let engine = Arc::new(engine);
        let gateway = SearchGateway::new(GatewayConfig::default(), engine.clone()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(http::serve(listener, Arc::new(gateway)));
        Self {
            base: format!("http://{addr}"),
            engine,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path_and_query: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base, path_and_query))
            .send()
            .await
            .unwrap()
    }

    async fn json(&self, path_and_query: &str) -> Value {
        let response = self.get(path_and_query).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {path_and_query}");
        response.json().await.unwrap()
    }
}

fn add(engine: &InMemoryEngine, index: &str, id: &str, source: Value) {
    engine.add_document(index, "edition", id, source);
}

fn links(body: &Value) -> Vec<&str> {
    body["results"]
        .as_array()
        .map(|r| r.iter().filter_map(|d| d["link"].as_str()).collect())
        .unwrap_or_default()
}

fn corpus() -> InMemoryEngine {
    let engine = InMemoryEngine::new();
    add(&engine, "govuk", "/vat-rates", json!({
        "link": "/vat-rates", "title": "VAT rates", "format": "answer",
        "description": "Current VAT rates", "organisations": ["hm-revenue-customs"],
    }));
    add(&engine, "government", "/vat-notice", json!({
        "link": "/vat-notice", "title": "VAT notice 700", "format": "guide",
        "organisations": ["hm-revenue-customs"],
    }));
    add(&engine, "government", "/organisations/hmrc", json!({
        "link": "/government/organisations/hm-revenue-customs", "slug": "hm-revenue-customs",
        "title": "HM Revenue & Customs", "format": "organisation",
    }));
    engine
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn happy_search_all_route_forms() {
    let server = TestServer::start(corpus()).await;
    for path in ["/search", "/search.json", "/api/search.json"] {
        let response = server.get(&format!("{path}?q=vat&fields=link")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["total"], 2, "{path}");
    }
}

#[tokio::test]
async fn happy_organisations_are_expanded() {
    let server = TestServer::start(corpus()).await;
    let body = server
        .json("/search.json?q=notice&fields=link&fields=organisations")
        .await;
    let organisations = &body["results"][0]["organisations"];
    assert_eq!(organisations[0]["slug"], "hm-revenue-customs");
    assert_eq!(organisations[0]["title"], "HM Revenue & Customs");
}

#[tokio::test]
async fn happy_withdrawn_needs_debug_flag() {
    let engine = InMemoryEngine::new();
    add(&engine, "government", "/old", json!({"link": "/old", "title": "Old guidance", "is_withdrawn": true}));
    let server = TestServer::start(engine).await;

    let body = server.json("/search.json?q=guidance").await;
    assert_eq!(body["total"], 0);

    let body = server.json("/search.json?q=guidance&debug=include_withdrawn").await;
    assert_eq!(body["total"], 1);
    assert!(body["results"][0].get("is_withdrawn").is_none());

    let body = server
        .json("/search.json?q=guidance&debug=include_withdrawn&fields=is_withdrawn")
        .await;
    assert_eq!(body["results"][0]["is_withdrawn"], true);
}

#[tokio::test]
async fn happy_browse_page_aggregate_counts() {
    let engine = InMemoryEngine::new();
    for index in ["govuk", "government"] {
        for page in ["browse/page/1", "browse/page/2"] {
            let link = format!("/{index}/{page}");
            add(&engine, index, &link, json!({"link": link, "mainstream_browse_pages": [page]}));
        }
    }
    let server = TestServer::start(engine).await;

    let body = server
        .json("/search.json?aggregate_mainstream_browse_pages=2")
        .await;
    assert_eq!(body["total"], 4);
    let aggregate = &body["aggregates"]["mainstream_browse_pages"];
    assert_eq!(aggregate["total_options"], 2);
    assert_eq!(aggregate["missing_options"], 0);
    assert_eq!(aggregate["options"][0]["documents"], 2);
    assert_eq!(aggregate["options"][1]["documents"], 2);
    assert!(body.get("facets").is_none());
}

#[tokio::test]
async fn happy_facet_spelling_is_echoed() {
    let server = TestServer::start(corpus()).await;
    let body = server.json("/search.json?q=vat&facet_format=5").await;
    assert_eq!(body["facets"]["format"]["total_options"], 2);
    assert!(body.get("aggregates").is_none());
}

#[tokio::test]
async fn happy_best_bet_for_external_link() {
    let engine = corpus();
    add(&engine, "govuk", "external-vat-calculator", json!({
        "link": "https://www.example.com/vat-calculator", "title": "Calculator", "format": "recommended-link",
    }));
    let (id, source) = bet_document(&BetEntry {
        query: "vat".into(),
        query_match: QueryMatch::Exact,
        best: vec![BestBet {
            link: "https://www.example.com/vat-calculator".into(),
            position: 1,
        }],
        worst: vec![],
    });
    engine.add_document("metasearch", BEST_BET_TYPE, &id, source);
    let server = TestServer::start(engine).await;

    let body = server.json("/search.json?q=vat&fields=link").await;
    assert_eq!(links(&body)[0], "https://www.example.com/vat-calculator");
}

#[tokio::test]
async fn happy_batch_preserves_order() {
    let server = TestServer::start(corpus()).await;
    let body = server
        .json("/batch_search.json?search[][0][q]=notice&search[][0][fields]=link&search[][1][q]=rates&search[][1][fields]=link")
        .await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(links(&results[0]), vec!["/vat-notice"]);
    assert_eq!(links(&results[1]), vec!["/vat-rates"]);
}

#[tokio::test]
async fn happy_specialist_documents_search() {
    let engine = InMemoryEngine::new();
    add(&engine, "specialist-finder", "/cma-cases/a", json!({
        "link": "/cma-cases/a", "title": "Merger A", "case_type": "mergers", "opened_date": "2015-03-01",
    }));
    add(&engine, "specialist-finder", "/cma-cases/b", json!({
        "link": "/cma-cases/b", "title": "Market B", "case_type": "markets", "opened_date": "2016-03-01",
    }));
    let server = TestServer::start(engine).await;

    for path in ["/specialist-documents-search", "/api/specialist-documents-search.json"] {
        let body = server
            .json(&format!("{path}?filter_opened_date=from:2016-01-01&fields=link"))
            .await;
        assert_eq!(links(&body), vec!["/cma-cases/b"], "{path}");
    }
    let body = server
        .json("/specialist-documents-search.json?reject_any_case_type=mergers&fields=link")
        .await;
    assert_eq!(links(&body), vec!["/cma-cases/b"]);
}

#[tokio::test]
async fn happy_advanced_search() {
    let engine = InMemoryEngine::new();
    add(&engine, "mainstream", "a", json!({"link": "a", "title": "Car tax", "format": "answer"}));
    add(&engine, "mainstream", "b", json!({"link": "b", "title": "Tax bands", "format": "guide"}));
    let server = TestServer::start(engine).await;

    let body = server
        .json("/mainstream/advanced_search.json?page=1&per_page=10&keywords=tax&format=answer")
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["results"][0]["link"], "/a");
}

#[tokio::test]
async fn happy_health() {
    let server = TestServer::start(corpus()).await;
    let body = server.json("/health").await;
    assert_eq!(body["status"], "green");
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn failure_unknown_parameters_are_422_json() {
    let server = TestServer::start(corpus()).await;
    let response = server.get("/search.json?foo=1&q=vat&bar=2").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "Unexpected parameters: foo, bar"}));
}

#[tokio::test]
async fn failure_repeated_date_filter() {
    let server = TestServer::start(InMemoryEngine::new()).await;
    let response = server
        .get("/specialist-documents-search.json?filter_opened_date[]=from:2014-01-01&filter_opened_date[]=to:2014-02-01")
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Too many values (2) for parameter \"opened_date\" (must occur at most once)"
    );
}

#[tokio::test]
async fn failure_oversized_batch_is_400_text() {
    let server = TestServer::start(corpus()).await;
    let query = (0..11)
        .map(|i| format!("search[][{i}][q]=vat"))
        .collect::<Vec<_>>()
        .join("&");
    let response = server.get(&format!("/batch_search.json?{query}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "Maximum of 10 searches per batch");
    assert_eq!(server.engine.search_count(), 0);
}

#[tokio::test]
async fn failure_integer_overflow_is_400_text() {
    let server = TestServer::start(corpus()).await;
    let response = server.get("/search.json?start=99999999999").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text().await.unwrap(),
        "Integer value of 99999999999 exceeds maximum allowed"
    );
}

#[tokio::test]
async fn failure_advanced_search_errors() {
    let server = TestServer::start(corpus()).await;
    let response = server.get("/mainstream/advanced_search.json?keywords=tax").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Pagination params are required.");

    let response = server.get("/secret/advanced_search.json?page=1&per_page=1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
