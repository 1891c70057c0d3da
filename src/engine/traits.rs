// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::search::{Query, SearchRequest};

/// Upper bound on documents fetched by one format lookup.
pub const FORMAT_LOOKUP_SIZE: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Search engine timed out")]
    Timeout,
    #[error("Search engine unavailable: {0}")]
    Unavailable(String),
    #[error("Search engine error ({status}): {body}")]
    Backend { status: u16, body: String },
    #[error("Malformed search engine response: {0}")]
    MalformedResponse(String),
}

/// One matching document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawHit {
    pub index: String,
    pub doc_type: String,
    pub id: String,
    /// `None` when results were sorted on a field
    pub score: Option<f64>,
    pub source: Map<String, Value>,
    /// Highlight fragments per field, already marked up
    pub highlight: BTreeMap<String, Vec<String>>,
    pub explanation: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationResult {
    /// Buckets by descending count
    Terms { buckets: Vec<Bucket> },
    Missing { doc_count: u64 },
}

/// Engine answer to one [`SearchRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSearchResponse {
    /// Matches after the post filter, before paging
    pub total: u64,
    pub hits: Vec<RawHit>,
    pub aggregations: BTreeMap<String, AggregationResult>,
}

impl RawSearchResponse {
    pub fn buckets(&self, name: &str) -> &[Bucket] {
        match self.aggregations.get(name) {
            Some(AggregationResult::Terms { buckets }) => buckets,
            _ => &[],
        }
    }

    pub fn missing_count(&self, name: &str) -> u64 {
        match self.aggregations.get(name) {
            Some(AggregationResult::Missing { doc_count }) => *doc_count,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(
        &self,
        indexes: &[String],
        request: &SearchRequest,
    ) -> Result<RawSearchResponse, EngineError>;

    /// Run several searches. Default implementation runs them in order.
    async fn multi_search(
        &self,
        searches: &[(Vec<String>, SearchRequest)],
    ) -> Result<Vec<RawSearchResponse>, EngineError> {
        let mut responses = Vec::with_capacity(searches.len());
        for (indexes, request) in searches {
            responses.push(self.search(indexes, request).await?);
        }
        Ok(responses)
    }

    /// Sources of every document of one format in an index.
    async fn documents_by_format(
        &self,
        index: &str,
        format: &str,
        fields: &[String],
    ) -> Result<Vec<Map<String, Value>>, EngineError> {
        let mut request = SearchRequest::new(Query::term("format", format), FORMAT_LOOKUP_SIZE);
        request.source_fields = fields.to_vec();
        let response = self.search(&[index.to_string()], &request).await?;
        Ok(response.hits.into_iter().map(|hit| hit.source).collect())
    }

    async fn health(&self) -> Result<EngineHealth, EngineError>;
}
