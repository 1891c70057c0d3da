// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search engine clients.
//!
//! ```text
//! SearchEngine (trait)
//!     ├─→ ElasticsearchClient   HTTP, behind a circuit breaker
//!     └─→ InMemoryEngine        evaluates the query AST over stored JSON
//! ```

mod elasticsearch;
mod memory;
mod traits;

pub use elasticsearch::{parse_response, ElasticsearchClient};
pub use memory::{html_escape, InMemoryEngine};
pub use traits::{
    AggregationResult, Bucket, EngineError, EngineHealth, RawHit, RawSearchResponse, SearchEngine,
    FORMAT_LOOKUP_SIZE,
};
