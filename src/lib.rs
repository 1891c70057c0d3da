//! # Search Gateway
//!
//! A search-query gateway in front of Elasticsearch: it validates untrusted
//! search parameters, builds engine queries, and presents results.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HTTP (axum)                          │
//! │  • /search  /batch_search  /specialist-documents-search     │
//! │  • /<index>/advanced_search.json (legacy)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Parameter Parser                        │
//! │  • 422 for invalid parameters, 400 for request shape       │
//! │  • Filters, aggregates, debug options                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 (best and worst bets for the query)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Query Builder                         │
//! │  • Text query, boosting, withdrawn exclusion               │
//! │  • post_filter + scoped aggregations                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Search Engine (Elasticsearch)               │
//! │  • Circuit breaker, bounded timeout, no inline retries     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Result Presenter + Aggregate Processor           │
//! │  • Projection, entity expansion, highlighting              │
//! │  • Option ordering, missing options, examples              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use search_gateway::{http, GatewayConfig, InMemoryEngine, SearchGateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::default();
//!     let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//!     let gateway = SearchGateway::new(config, Arc::new(InMemoryEngine::new()))?;
//!     http::serve(listener, Arc::new(gateway)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`params`]: parameter parser and filter model
//! - [`search`]: query AST, request builder, Elasticsearch translator
//! - [`best_bets`]: best and worst bet resolution
//! - [`engine`]: [`SearchEngine`] trait, in-memory engine, HTTP client
//! - [`aggregates`]: aggregate post-processing and examples
//! - [`presenter`]: result projection, expansion, highlighting
//! - [`registry`]: timed entity registries
//! - [`gateway`]: the [`SearchGateway`] pipeline
//! - [`batch`]: batch search
//! - [`legacy`]: legacy advanced search
//! - [`http`]: axum router
//! - [`resilience`]: circuit breaker and startup retry

pub mod analysis;
pub mod schema;
pub mod params;
pub mod search;
pub mod best_bets;
pub mod engine;
pub mod aggregates;
pub mod presenter;
pub mod registry;
pub mod suggest;
pub mod gateway;
pub mod batch;
pub mod legacy;
pub mod http;
pub mod resilience;
pub mod config;
pub mod metrics;

pub use config::{ConfigError, GatewayConfig};
pub use gateway::{GatewayError, SearchGateway, SearchSurface};
pub use batch::{run_batch, split_searches, BatchResponse};
pub use legacy::{AdvancedSearch, LegacyResponse};
pub use engine::{ElasticsearchClient, EngineError, InMemoryEngine, RawSearchResponse, SearchEngine};
pub use params::{ParseError, QueryParameters, RawParams};
pub use presenter::SearchResponse;
pub use schema::SearchSchema;
pub use suggest::{DictionarySuggester, Suggester};
pub use resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError};
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
