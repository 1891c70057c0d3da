// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Example documents for aggregate options.
//!
//! For each presented option of an aggregate that asked for examples, the
//! most popular documents carrying that value are fetched and attached as
//! `value.example_info = {total, examples}`.
//!
//! Lookups go to the engine as multi-searches of [`EXAMPLE_BATCH_SIZE`] so a
//! large aggregate does not flood the engine's search queue.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::PresentedAggregate;
use crate::engine::{EngineError, RawSearchResponse, SearchEngine};
use crate::params::{AggregateRequest, ExampleScope, QueryParameters, SortDirection};
use crate::schema::SearchSchema;
use crate::search::{combine_filters, BoolQuery, Query, QueryNode, SearchRequest, SortClause};

/// Option values looked up per engine round trip.
pub const EXAMPLE_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExampleInfo {
    pub total: u64,
    pub examples: Vec<Map<String, Value>>,
}

pub struct ExampleFetcher<'a> {
    engine: &'a dyn SearchEngine,
    indexes: &'a [String],
    schema: &'a SearchSchema,
    params: &'a QueryParameters,
    query: &'a Query,
}

impl<'a> ExampleFetcher<'a> {
    /// `query` is the main request's query, used for `example_scope:query`.
    pub fn new(
        engine: &'a dyn SearchEngine,
        indexes: &'a [String],
        schema: &'a SearchSchema,
        params: &'a QueryParameters,
        query: &'a Query,
    ) -> Self {
        Self {
            engine,
            indexes,
            schema,
            params,
            query,
        }
    }

    /// Fetch and attach examples to every aggregate that requested them.
    pub async fn attach(
        &self,
        aggregates: &mut BTreeMap<String, PresentedAggregate>,
    ) -> Result<(), EngineError> {
        for (field, aggregate) in aggregates.iter_mut() {
            let Some(request) = self.params.aggregates.get(field) else {
                continue;
            };
            if request.examples == 0 {
                continue;
            }
            let slugs: Vec<String> = aggregate
                .options
                .iter()
                .filter_map(|o| o.slug().map(str::to_string))
                .collect();
            let mut examples = self.fetch(field, request, &slugs).await?;
            for option in &mut aggregate.options {
                let info = option
                    .slug()
                    .and_then(|slug| examples.remove(slug))
                    .unwrap_or_default();
                option.value.insert(
                    "example_info".into(),
                    json!({"total": info.total, "examples": info.examples}),
                );
            }
        }
        Ok(())
    }

    /// Examples for each of `slugs` of one aggregate field.
    pub async fn fetch(
        &self,
        field: &str,
        request: &AggregateRequest,
        slugs: &[String],
    ) -> Result<BTreeMap<String, ExampleInfo>, EngineError> {
        let mut result = BTreeMap::new();
        for batch in slugs.chunks(EXAMPLE_BATCH_SIZE) {
            let searches: Vec<(Vec<String>, SearchRequest)> = batch
                .iter()
                .map(|slug| (self.indexes.to_vec(), self.example_search(field, request, slug)))
                .collect();
            let responses = self.engine.multi_search(&searches).await?;
            if responses.len() != batch.len() {
                return Err(EngineError::MalformedResponse(format!(
                    "expected {} example responses, got {}",
                    batch.len(),
                    responses.len()
                )));
            }
            for (slug, response) in batch.iter().zip(responses) {
                result.insert(slug.clone(), self.example_info(response));
            }
        }
        debug!(field, values = slugs.len(), "Fetched aggregate examples");
        Ok(result)
    }

    fn example_search(&self, field: &str, request: &AggregateRequest, slug: &str) -> SearchRequest {
        let value_filter = Query::term(field, slug);
        let (query, post_filter) = match request.example_scope {
            Some(ExampleScope::Query) => {
                let filter = match combine_filters(&self.params.filters) {
                    Some(filters) => value_filter.and(filters),
                    None => value_filter,
                };
                (self.query.clone(), filter)
            }
            _ => {
                let visible = QueryNode::Bool(BoolQuery {
                    must: vec![QueryNode::MatchAll],
                    must_not: vec![QueryNode::boolean("is_withdrawn", true)],
                    ..Default::default()
                });
                (Query::new(visible), value_filter)
            }
        };

        let mut search = SearchRequest::new(query, request.examples);
        search.post_filter = Some(post_filter);
        search.source_fields = request.example_fields.clone();
        search.sort = vec![SortClause {
            field: "popularity".into(),
            direction: SortDirection::Desc,
        }];
        search
    }

    fn example_info(&self, response: RawSearchResponse) -> ExampleInfo {
        ExampleInfo {
            total: response.total,
            examples: response
                .hits
                .into_iter()
                .map(|hit| self.normalise_values(hit.source))
                .collect(),
        }
    }

    /// Multivalued fields as lists, everything else as a single value.
    fn normalise_values(&self, source: Map<String, Value>) -> Map<String, Value> {
        source
            .into_iter()
            .map(|(field, value)| {
                if field.starts_with('_') {
                    return (field, value);
                }
                let value = match (self.schema.is_multivalued(&field), value) {
                    (true, Value::Array(items)) => Value::Array(items),
                    (true, Value::Null) => Value::Array(Vec::new()),
                    (true, single) => Value::Array(vec![single]),
                    (false, Value::Array(items)) => items.into_iter().next().unwrap_or(Value::Null),
                    (false, single) => single,
                };
                (field, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::AggregateOption;
    use crate::engine::InMemoryEngine;
    use crate::params::{Filter, MultivalueMode, TextFilter};

    fn engine() -> InMemoryEngine {
        let engine = InMemoryEngine::new();
        let docs = [
            ("/a", "hmrc", "Tax guide", 10, false),
            ("/b", "hmrc", "VAT notice", 50, false),
            ("/c", "hmrc", "Old tax", 99, true),
            ("/d", "dvla", "Driving tax", 5, false),
        ];
        for (link, org, title, popularity, withdrawn) in docs {
            engine.add_document(
                "government",
                "edition",
                link,
                json!({"link": link, "title": title, "organisations": org,
                       "popularity": popularity, "is_withdrawn": withdrawn, "format": "guide"}),
            );
        }
        engine
    }

    fn request(scope: ExampleScope) -> AggregateRequest {
        let mut request = AggregateRequest::with_count(10);
        request.examples = 5;
        request.example_scope = Some(scope);
        request.example_fields = vec!["link".into(), "title".into(), "organisations".into()];
        request
    }

    #[tokio::test]
    async fn test_global_examples_by_popularity() {
        let engine = engine();
        let indexes = vec!["government".to_string()];
        let schema = SearchSchema::government();
        let params = QueryParameters::default();
        let query = Query::match_all();
        let fetcher = ExampleFetcher::new(&engine, &indexes, &schema, &params, &query);

        let examples = fetcher
            .fetch("organisations", &request(ExampleScope::Global), &["hmrc".into(), "dvla".into()])
            .await
            .unwrap();
        let hmrc = &examples["hmrc"];
        assert_eq!(hmrc.total, 2);
        assert_eq!(hmrc.examples[0]["link"], "/b");
        assert_eq!(hmrc.examples[0]["organisations"], json!(["hmrc"]));
        assert_eq!(examples["dvla"].total, 1);
    }

    #[tokio::test]
    async fn test_query_scope_applies_filters() {
        let engine = engine();
        let indexes = vec!["government".to_string()];
        let schema = SearchSchema::government();
        let params = QueryParameters {
            filters: vec![Filter::Text(TextFilter::new(
                "link",
                &["/a".to_string()],
                false,
                MultivalueMode::Any,
            ))],
            ..Default::default()
        };
        let query = Query::match_all();
        let fetcher = ExampleFetcher::new(&engine, &indexes, &schema, &params, &query);

        let examples = fetcher
            .fetch("organisations", &request(ExampleScope::Query), &["hmrc".into()])
            .await
            .unwrap();
        assert_eq!(examples["hmrc"].total, 1);
        assert_eq!(examples["hmrc"].examples[0]["title"], "Tax guide");
    }

    #[tokio::test]
    async fn test_attach_to_options() {
        let engine = engine();
        let indexes = vec!["government".to_string()];
        let schema = SearchSchema::government();
        let mut params = QueryParameters::default();
        params
            .aggregates
            .insert("organisations".into(), request(ExampleScope::Global));
        let query = Query::match_all();
        let fetcher = ExampleFetcher::new(&engine, &indexes, &schema, &params, &query);

        let option = |slug: &str| AggregateOption {
            value: json!({"slug": slug}).as_object().cloned().unwrap_or_default(),
            documents: 1,
            applied: false,
        };
        let mut aggregates = BTreeMap::from([(
            "organisations".to_string(),
            PresentedAggregate {
                options: vec![option("hmrc"), option("nobody")],
                documents_with_no_value: 0,
                total_options: 2,
                missing_options: 0,
                scope: "exclude_field_filter",
            },
        )]);
        fetcher.attach(&mut aggregates).await.unwrap();

        let options = &aggregates["organisations"].options;
        assert_eq!(options[0].value["example_info"]["total"], 2);
        assert_eq!(options[1].value["example_info"], json!({"total": 0, "examples": []}));
    }
}
