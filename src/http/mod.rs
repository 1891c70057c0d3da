// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP surface.
//!
//! ```text
//! GET /search  /search.json  /api/search.json
//! GET /batch_search  /batch_search.json  /api/batch_search.json
//! GET /specialist-documents-search(.json)  /api/specialist-documents-search(.json)
//! GET /:index/advanced_search.json
//! GET /health
//! ```
//!
//! Handlers take the raw query string so repeated and nested parameters
//! reach the parsers untouched. Every response allows any origin.

mod error;
mod handlers;

pub use error::{ApiError, TIMEOUT_MESSAGE};

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::gateway::SearchGateway;

/// Router over a shared gateway.
pub fn router(gateway: Arc<SearchGateway>) -> Router {
    Router::new()
        .route("/search", get(handlers::search))
        .route("/search.json", get(handlers::search))
        .route("/api/search.json", get(handlers::search))
        .route("/batch_search", get(handlers::batch_search))
        .route("/batch_search.json", get(handlers::batch_search))
        .route("/api/batch_search.json", get(handlers::batch_search))
        .route("/specialist-documents-search", get(handlers::specialist_search))
        .route("/specialist-documents-search.json", get(handlers::specialist_search))
        .route("/api/specialist-documents-search", get(handlers::specialist_search))
        .route("/api/specialist-documents-search.json", get(handlers::specialist_search))
        .route("/:index/advanced_search.json", get(handlers::advanced_search))
        .route("/health", get(handlers::health))
        .layer(middleware::map_response(allow_any_origin))
        .layer(middleware::from_fn(trace_request))
        .with_state(gateway)
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn trace_request(request: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );
    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        debug!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request complete"
        );
    });
    response
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, gateway: Arc<SearchGateway>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Search gateway listening");
    }
    axum::serve(listener, router(gateway)).await
}
