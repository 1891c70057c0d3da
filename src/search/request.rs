// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Structured search request handed to a [`SearchEngine`](crate::engine::SearchEngine).

use serde::{Deserialize, Serialize};

use super::query_builder::Query;
use crate::params::SortDirection;

/// Terms aggregations ask for every bucket.
pub const UNBOUNDED_BUCKETS: usize = 100_000;

/// Suffix of the companion aggregation counting documents without a value.
pub const MISSING_AGGREGATION_SUFFIX: &str = "_with_missing_value";

/// Engine-neutral search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub from: usize,
    pub size: usize,
    /// Stored fields to return with each hit
    pub source_fields: Vec<String>,
    /// Scoring query; also defines the documents aggregations run over
    pub query: Query,
    /// Filter applied to hits after aggregations are computed
    pub post_filter: Option<Query>,
    /// Empty means relevance order
    pub sort: Vec<SortClause>,
    pub aggregations: Vec<Aggregation>,
    pub highlight: Option<HighlightRequest>,
    pub explain: bool,
}

impl SearchRequest {
    /// Request for `size` hits matching `query`, nothing else.
    pub fn new(query: Query, size: usize) -> Self {
        Self {
            from: 0,
            size,
            source_fields: Vec::new(),
            query,
            post_filter: None,
            sort: Vec::new(),
            aggregations: Vec::new(),
            highlight: None,
            explain: false,
        }
    }
}

/// Sort on one field; documents without the field sort last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    pub field: String,
    pub direction: SortDirection,
}

/// Named aggregation computed over the query's documents restricted by
/// `filter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub name: String,
    pub filter: Option<Query>,
    pub kind: AggregationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationKind {
    /// Document count per distinct value
    Terms { field: String, size: usize },
    /// Count of documents without the field
    Missing { field: String },
}

/// Highlighting of matched query terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRequest {
    pub fields: Vec<HighlightField>,
    pub pre_tag: String,
    pub post_tag: String,
    /// HTML-escape text outside the tags
    pub encode_html: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightField {
    pub name: String,
    /// `None` highlights the whole field as one fragment
    pub fragment_size: Option<usize>,
    pub number_of_fragments: usize,
}
