// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query building.
//!
//! # Architecture
//!
//! ```text
//! QueryParameters + PromotionSet
//!     ↓
//! SearchRequestBuilder
//!     ├─→ TextQuery        weighted dis_max clauses over the text fields
//!     ├─→ boosting         format / popularity / best bets wrappers
//!     └─→ filters          Filter model → query nodes
//!     ↓
//! SearchRequest (Query AST)
//!     ├─→ ElasticsearchTranslator → _search JSON
//!     └─→ InMemoryEngine evaluates the AST directly
//! ```
//!
//! # Query Language
//!
//! ```text
//! Query::term("format", "guide")                    - keyword equals
//! Query::terms("organisations", vec![..])           - keyword membership (OR)
//! Query::exists("organisations").negate()           - field missing
//! Query::date_range("public_timestamp", from, to)   - inclusive date range
//! a.and(b) / a.or(b)                                - boolean combination
//! ```

mod boosting;
mod es_translator;
mod filters;
mod query_builder;
mod request;
mod request_builder;
mod text_query;

pub use boosting::{
    best_bets, format_boost, popularity_boost, BEST_BET_BOOST, CLOSED_ORGANISATION_BOOST,
    FORMAT_BOOSTS, HISTORIC_BOOST,
};
pub use es_translator::{ElasticsearchTranslator, FILTERED_AGGREGATIONS};
pub use filters::{combine_filters, filter_node};
pub use query_builder::{
    BoolQuery, DisMaxQuery, FieldOperator, FieldQuery, FunctionScoreQuery, LikeDocument,
    MatchOptions, MoreLikeThisQuery, Query, QueryBuilder, QueryNode, QueryValue, ScoreFunction,
};
pub use request::{
    Aggregation, AggregationKind, HighlightField, HighlightRequest, SearchRequest, SortClause,
    MISSING_AGGREGATION_SUFFIX, UNBOUNDED_BUCKETS,
};
pub use request_builder::{
    SearchRequestBuilder, ALWAYS_FETCHED, DEFAULT_DESCRIPTION_BUDGET,
    HIGHLIGHT_POST_TAG, HIGHLIGHT_PRE_TAG,
};
pub use text_query::{TextQuery, ALL_SEARCHABLE_TEXT, MATCH_FIELDS, MINIMUM_SHOULD_MATCH};
