// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Legacy advanced search on a single index.
//!
//! Older clients page through one index with keyword and property filters
//! and get back `{"total", "results"}`. Results are the stored documents
//! with a normalised link and the engine score; nothing is expanded and no
//! aggregations are computed.

mod params;

pub use params::{parse_advanced, AdvancedSearchParams};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::engine::{EngineError, RawHit, SearchEngine};
use crate::params::{ParseError, RawParams};
use crate::presenter::fix_link;
use crate::schema::SearchSchema;
use crate::search::{
    combine_filters, BoolQuery, MatchOptions, Query, QueryNode, SearchRequest, SortClause,
    ALL_SEARCHABLE_TEXT,
};

const TITLE_BOOST: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyResponse {
    pub total: u64,
    pub results: Vec<Map<String, Value>>,
}

/// Advanced search against one index.
pub struct AdvancedSearch {
    index: String,
    max_page: usize,
    schema: SearchSchema,
}

impl AdvancedSearch {
    pub fn new(index: impl Into<String>, max_page: usize) -> Self {
        Self {
            index: index.into(),
            max_page,
            schema: SearchSchema::government(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn parse(&self, raw: &RawParams) -> Result<AdvancedSearchParams, ParseError> {
        parse_advanced(raw, &self.schema, self.max_page)
    }

    /// Engine request for parsed parameters.
    pub fn request(&self, params: &AdvancedSearchParams) -> SearchRequest {
        let core = match &params.keywords {
            Some(keywords) => QueryNode::Bool(BoolQuery {
                should: vec![
                    QueryNode::text_match(
                        "title",
                        keywords,
                        MatchOptions {
                            boost: TITLE_BOOST,
                            require_all: true,
                            minimum_should_match: None,
                        },
                    ),
                    QueryNode::text_match(ALL_SEARCHABLE_TEXT, keywords, MatchOptions::default()),
                ],
                ..Default::default()
            }),
            None => QueryNode::MatchAll,
        };

        let mut must = vec![core];
        if let Some(filters) = combine_filters(&params.filters) {
            must.push(filters.root);
        }
        let query = Query::new(QueryNode::Bool(BoolQuery {
            must,
            must_not: vec![QueryNode::boolean("is_withdrawn", true)],
            ..Default::default()
        }));

        let mut request = SearchRequest::new(query, params.per_page);
        request.from = params.from();
        if let Some((field, direction)) = &params.order {
            request.sort = vec![SortClause {
                field: field.clone(),
                direction: *direction,
            }];
        }
        request
    }

    pub async fn execute(
        &self,
        engine: &dyn SearchEngine,
        params: &AdvancedSearchParams,
    ) -> Result<LegacyResponse, EngineError> {
        let request = self.request(params);
        let response = engine.search(&[self.index.clone()], &request).await?;
        debug!(
            index = %self.index,
            total = response.total,
            returned = response.hits.len(),
            "Advanced search complete"
        );
        Ok(LegacyResponse {
            total: response.total,
            results: response.hits.into_iter().map(present_hit).collect(),
        })
    }
}

fn present_hit(hit: RawHit) -> Map<String, Value> {
    let mut result = hit.source;
    fix_link(&mut result);
    let score = hit
        .score
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number);
    result.insert("es_score".into(), score);
    result
}
