// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Elasticsearch Translator
//!
//! Translates the Query AST and [`SearchRequest`] to Elasticsearch JSON.
//!
//! # Query DSL mapping
//!
//! ```text
//! MatchAll                → {"match_all": {}}
//! Equals                  → {"term": {field: value}}
//! In                      → {"terms": {field: [values]}}
//! Exists                  → {"exists": {"field": field}}
//! Range                   → {"range": {field: {"gte": from, "lte": to}}}
//! Match                   → {"match": {field: {query, boost, operator, minimum_should_match}}}
//! Phrase                  → {"match_phrase": {field: {query, boost}}}
//! And / Or / Not / Bool   → {"bool": {...}}
//! DisMax                  → {"dis_max": {queries, tie_breaker}}
//! ConstantScore           → {"constant_score": {filter, boost}}
//! FunctionScore           → {"function_score": {query, functions, score_mode, boost_mode}}
//! MoreLikeThis            → {"more_like_this": {like, min_doc_freq}}
//! ```
//!
//! Aggregations are wrapped in a filter aggregation so each can carry its
//! own filter scope:
//!
//! ```text
//! "<name>": {"filter": <scope>, "aggs": {"filtered_aggregations": <terms|missing>}}
//! ```

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

use super::query_builder::{
    BoolQuery, FieldOperator, FieldQuery, FunctionScoreQuery, Query, QueryNode, QueryValue,
    ScoreFunction,
};
use super::request::{AggregationKind, SearchRequest};

/// Key of the inner aggregation inside each filter wrapper.
pub const FILTERED_AGGREGATIONS: &str = "filtered_aggregations";

/// Elasticsearch query translator
pub struct ElasticsearchTranslator;

impl ElasticsearchTranslator {
    /// Translate Query AST to Elasticsearch query DSL
    pub fn translate(query: &Query) -> Value {
        Self::translate_node(&query.root)
    }

    /// Full `_search` request body.
    pub fn request_body(request: &SearchRequest) -> Value {
        let mut body = Map::new();
        body.insert("from".into(), json!(request.from));
        body.insert("size".into(), json!(request.size));
        if !request.source_fields.is_empty() {
            body.insert("_source".into(), json!({ "includes": request.source_fields }));
        }
        body.insert("query".into(), Self::translate(&request.query));
        if let Some(filter) = &request.post_filter {
            body.insert("post_filter".into(), Self::translate(filter));
        }
        if !request.sort.is_empty() {
            let sort: Vec<Value> = request
                .sort
                .iter()
                .map(|clause| {
                    json!({ clause.field.clone(): { "order": clause.direction.as_str(), "missing": "_last" } })
                })
                .collect();
            body.insert("sort".into(), Value::Array(sort));
        }
        if !request.aggregations.is_empty() {
            let mut aggs = Map::new();
            for aggregation in &request.aggregations {
                let inner = match &aggregation.kind {
                    AggregationKind::Terms { field, size } => {
                        json!({ "terms": { "field": field, "order": { "_count": "desc" }, "size": size } })
                    }
                    AggregationKind::Missing { field } => json!({ "missing": { "field": field } }),
                };
                let filter = aggregation
                    .filter
                    .as_ref()
                    .map(Self::translate)
                    .unwrap_or_else(|| json!({ "match_all": {} }));
                aggs.insert(
                    aggregation.name.clone(),
                    json!({ "filter": filter, "aggs": { FILTERED_AGGREGATIONS: inner } }),
                );
            }
            body.insert("aggs".into(), Value::Object(aggs));
        }
        if let Some(highlight) = &request.highlight {
            let mut fields = Map::new();
            for field in &highlight.fields {
                let mut spec = Map::new();
                spec.insert("number_of_fragments".into(), json!(field.number_of_fragments));
                if let Some(size) = field.fragment_size {
                    spec.insert("fragment_size".into(), json!(size));
                }
                fields.insert(field.name.clone(), Value::Object(spec));
            }
            let mut spec = Map::new();
            spec.insert("pre_tags".into(), json!([highlight.pre_tag]));
            spec.insert("post_tags".into(), json!([highlight.post_tag]));
            if highlight.encode_html {
                spec.insert("encoder".into(), json!("html"));
            }
            spec.insert("fields".into(), Value::Object(fields));
            body.insert("highlight".into(), Value::Object(spec));
        }
        if request.explain {
            body.insert("explain".into(), json!(true));
        }
        Value::Object(body)
    }

    fn translate_node(node: &QueryNode) -> Value {
        match node {
            QueryNode::MatchAll => json!({ "match_all": {} }),
            QueryNode::Field(field_query) => Self::translate_field(field_query),
            QueryNode::And(nodes) => json!({ "bool": { "must": Self::translate_all(nodes) } }),
            QueryNode::Or(nodes) => json!({
                "bool": { "should": Self::translate_all(nodes), "minimum_should_match": 1 }
            }),
            QueryNode::Not(inner) => json!({ "bool": { "must_not": [Self::translate_node(inner)] } }),
            QueryNode::Bool(bool_query) => Self::translate_bool(bool_query),
            QueryNode::DisMax(dis_max) => json!({
                "dis_max": {
                    "queries": Self::translate_all(&dis_max.queries),
                    "tie_breaker": dis_max.tie_breaker,
                }
            }),
            QueryNode::ConstantScore { filter, boost } => json!({
                "constant_score": { "filter": Self::translate_node(filter), "boost": boost }
            }),
            QueryNode::FunctionScore(function_score) => Self::translate_function_score(function_score),
            QueryNode::MoreLikeThis(mlt) => {
                let like: Vec<Value> = mlt
                    .like
                    .iter()
                    .map(|doc| json!({ "_id": doc.id, "_index": doc.index }))
                    .collect();
                json!({ "more_like_this": { "like": like, "min_doc_freq": 0 } })
            }
        }
    }

    fn translate_all(nodes: &[QueryNode]) -> Vec<Value> {
        nodes.iter().map(Self::translate_node).collect()
    }

    fn translate_bool(query: &BoolQuery) -> Value {
        let mut clauses = Map::new();
        for (name, nodes) in [
            ("must", &query.must),
            ("should", &query.should),
            ("filter", &query.filter),
            ("must_not", &query.must_not),
        ] {
            if !nodes.is_empty() {
                clauses.insert(name.into(), Value::Array(Self::translate_all(nodes)));
            }
        }
        json!({ "bool": clauses })
    }

    fn translate_function_score(query: &FunctionScoreQuery) -> Value {
        let functions: Vec<Value> = query
            .functions
            .iter()
            .map(|function| match function {
                ScoreFunction::Weight { filter, weight } => {
                    json!({ "filter": Self::translate_node(filter), "weight": weight })
                }
                ScoreFunction::FieldValueFactor { field, missing } => json!({
                    "field_value_factor": { "field": field, "modifier": "log2p", "missing": missing }
                }),
            })
            .collect();
        json!({
            "function_score": {
                "query": Self::translate_node(&query.query),
                "functions": functions,
                "score_mode": "multiply",
                "boost_mode": "multiply",
            }
        })
    }

    fn translate_field(field: &FieldQuery) -> Value {
        let name = field.field.as_str();

        match (&field.operator, &field.value) {
            (FieldOperator::Equals, QueryValue::Text(text)) => json!({ "term": { name: text } }),
            (FieldOperator::Equals, QueryValue::Boolean(b)) => json!({ "term": { name: b } }),
            (FieldOperator::In, QueryValue::Tags(tags)) => json!({ "terms": { name: tags } }),
            (FieldOperator::Exists, _) => json!({ "exists": { "field": name } }),
            (FieldOperator::Range, QueryValue::DateRange { from, to }) => {
                let mut bounds = Map::new();
                if let Some(from) = from {
                    bounds.insert("gte".into(), json!(from.to_rfc3339_opts(SecondsFormat::Secs, true)));
                }
                if let Some(to) = to {
                    bounds.insert("lte".into(), json!(to.to_rfc3339_opts(SecondsFormat::Secs, true)));
                }
                json!({ "range": { name: bounds } })
            }
            (FieldOperator::Match(options), QueryValue::Text(text)) => {
                let mut spec = Map::new();
                spec.insert("query".into(), json!(text));
                spec.insert("boost".into(), json!(options.boost));
                spec.insert(
                    "operator".into(),
                    json!(if options.require_all { "and" } else { "or" }),
                );
                if let Some(msm) = &options.minimum_should_match {
                    spec.insert("minimum_should_match".into(), json!(msm));
                }
                json!({ "match": { name: spec } })
            }
            (FieldOperator::Phrase { boost }, QueryValue::Text(text)) => {
                json!({ "match_phrase": { name: { "query": text, "boost": boost } } })
            }
            // Unsupported operator/value pairs match nothing
            _ => json!({ "bool": { "must_not": [{ "match_all": {} }] } }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SortDirection;
    use crate::search::query_builder::MatchOptions;
    use crate::search::request::{Aggregation, SortClause};
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn test_term_query() {
        let query = Query::term("format", "guide");
        assert_eq!(ElasticsearchTranslator::translate(&query), json!({"term": {"format": "guide"}}));
    }

    #[test]
    fn test_terms_query() {
        let query = Query::terms("organisations", vec!["hmrc".into(), "dvla".into()]);
        assert_eq!(
            ElasticsearchTranslator::translate(&query),
            json!({"terms": {"organisations": ["hmrc", "dvla"]}})
        );
    }

    #[test]
    fn test_date_range_half_open() {
        let from = Utc.with_ymd_and_hms(2014, 4, 1, 0, 0, 0).unwrap();
        let query = Query::date_range("public_timestamp", Some(from), None);
        assert_eq!(
            ElasticsearchTranslator::translate(&query),
            json!({"range": {"public_timestamp": {"gte": "2014-04-01T00:00:00Z"}}})
        );
    }

    #[test]
    fn test_or_and_not() {
        let query = Query::term("format", "guide").or(Query::exists("format").negate());
        assert_eq!(
            ElasticsearchTranslator::translate(&query),
            json!({"bool": {
                "should": [
                    {"term": {"format": "guide"}},
                    {"bool": {"must_not": [{"exists": {"field": "format"}}]}}
                ],
                "minimum_should_match": 1
            }})
        );
    }

    #[test]
    fn test_match_options() {
        let query = Query::text_match(
            "title.no_stop",
            "tax",
            MatchOptions::boosted(5.0).minimum_should_match("1").require_all(),
        );
        assert_eq!(
            ElasticsearchTranslator::translate(&query),
            json!({"match": {"title.no_stop": {
                "query": "tax", "boost": 5.0, "operator": "and", "minimum_should_match": "1"
            }}})
        );
    }

    #[test]
    fn test_bool_omits_empty_clauses() {
        let query = Query::new(QueryNode::Bool(BoolQuery {
            must: vec![QueryNode::MatchAll],
            must_not: vec![QueryNode::boolean("is_withdrawn", true)],
            ..Default::default()
        }));
        assert_eq!(
            ElasticsearchTranslator::translate(&query),
            json!({"bool": {
                "must": [{"match_all": {}}],
                "must_not": [{"term": {"is_withdrawn": true}}]
            }})
        );
    }

    #[test]
    fn test_request_body_wraps_aggregations() {
        let mut request = SearchRequest::new(Query::match_all(), 10);
        request.sort.push(SortClause {
            field: "public_timestamp".into(),
            direction: SortDirection::Desc,
        });
        request.aggregations.push(Aggregation {
            name: "format".into(),
            filter: None,
            kind: AggregationKind::Terms {
                field: "format".into(),
                size: 100_000,
            },
        });
        let body = ElasticsearchTranslator::request_body(&request);
        assert_eq!(
            body["sort"],
            json!([{"public_timestamp": {"order": "desc", "missing": "_last"}}])
        );
        assert_eq!(body["aggs"]["format"]["filter"], json!({"match_all": {}}));
        assert_eq!(
            body["aggs"]["format"]["aggs"]["filtered_aggregations"]["terms"]["field"],
            json!("format")
        );
        assert!(body.get("explain").is_none());
        assert!(body.get("post_filter").is_none());
    }
}
