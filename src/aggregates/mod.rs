// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Aggregation post-processing.
//!
//! Turns the engine's terms/missing buckets into presented aggregates:
//!
//! ```text
//! buckets ∪ applied filter values (count 0)
//!     ↓ expand each value (registry object or {"slug": value})
//!     ↓ sort by the requested ordering
//!     ↓ top N with a count, plus every applied value
//! options, total_options, missing_options, documents_with_no_value
//! ```
//!
//! `total_options` counts every distinct value, so
//! `missing_options == total_options - options.len()` always holds.

mod examples;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::engine::{Bucket, RawSearchResponse};
use crate::params::{AggregateRequest, AggregateSortKey, QueryParameters, SortDirection};
use crate::presenter::EntityExpander;
use crate::search::MISSING_AGGREGATION_SUFFIX;

pub use examples::{ExampleFetcher, ExampleInfo, EXAMPLE_BATCH_SIZE};

/// One aggregate value with its document count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateOption {
    pub value: Map<String, Value>,
    pub documents: u64,
    #[serde(skip)]
    pub applied: bool,
}

impl AggregateOption {
    fn text(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn slug(&self) -> Option<&str> {
        self.text("slug")
    }

    fn title_key(&self) -> Option<String> {
        self.text("title").map(str::to_lowercase)
    }

    fn value_key(&self) -> Option<String> {
        self.title_key().or_else(|| self.slug().map(str::to_lowercase))
    }

    fn compare(&self, other: &Self, order: &[(AggregateSortKey, SortDirection)]) -> Ordering {
        for (key, direction) in order {
            let ordering = match key {
                AggregateSortKey::Filtered => other.applied.cmp(&self.applied),
                AggregateSortKey::Count => self.documents.cmp(&other.documents),
                AggregateSortKey::Value => present_first(self.value_key(), other.value_key()),
                AggregateSortKey::Slug => present_first(self.slug(), other.slug()),
                AggregateSortKey::Title => present_first(self.title_key(), other.title_key()),
                AggregateSortKey::Link => present_first(self.text("link"), other.text("link")),
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        present_first(self.slug(), other.slug())
    }
}

/// Options lacking a sort key go after those that have it.
fn present_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One aggregate as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentedAggregate {
    pub options: Vec<AggregateOption>,
    pub documents_with_no_value: u64,
    pub total_options: usize,
    pub missing_options: usize,
    pub scope: &'static str,
}

/// Present one aggregate from its buckets.
///
/// `applied` are the values of the field's own filters, rejected ones
/// included; they are always kept even when they have no bucket or fall
/// outside the requested count.
pub fn process_aggregate(
    buckets: &[Bucket],
    documents_with_no_value: u64,
    request: &AggregateRequest,
    applied: &[String],
    expand: impl Fn(&str) -> Map<String, Value>,
) -> PresentedAggregate {
    let applied_set: HashSet<&str> = applied.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(buckets.len() + applied.len());
    let mut unique: Vec<(&str, u64)> = Vec::with_capacity(buckets.len() + applied.len());
    let candidates = buckets
        .iter()
        .map(|b| (b.key.as_str(), b.doc_count))
        .chain(applied.iter().map(|v| (v.as_str(), 0)));
    for (term, count) in candidates {
        if seen.insert(term) {
            unique.push((term, count));
        }
    }

    let mut all: Vec<AggregateOption> = unique
        .into_iter()
        .map(|(term, count)| AggregateOption {
            value: expand(term),
            documents: count,
            applied: applied_set.contains(term),
        })
        .collect();
    all.sort_by(|a, b| a.compare(b, &request.order));

    let total_options = all.len();
    let mut kept = 0;
    let options: Vec<AggregateOption> = all
        .into_iter()
        .filter(|option| {
            let suggested = option.documents > 0 && kept < request.requested;
            if suggested {
                kept += 1;
            }
            suggested || option.applied
        })
        .collect();

    PresentedAggregate {
        missing_options: total_options - options.len(),
        options,
        documents_with_no_value,
        total_options,
        scope: request.scope.as_str(),
    }
}

/// Present every requested aggregate of a response.
pub fn present_aggregates(
    params: &QueryParameters,
    response: &RawSearchResponse,
    expander: &EntityExpander<'_>,
) -> BTreeMap<String, PresentedAggregate> {
    params
        .aggregates
        .iter()
        .map(|(field, request)| {
            let presented = process_aggregate(
                response.buckets(field),
                response.missing_count(&format!("{field}{MISSING_AGGREGATION_SUFFIX}")),
                request,
                &params.applied_values(field),
                |value| expander.expand_value(field, value),
            );
            (field.clone(), presented)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AggregateScope;
    use crate::registry::RegistrySnapshot;
    use serde_json::json;

    fn bucket(key: &str, doc_count: u64) -> Bucket {
        Bucket {
            key: key.into(),
            doc_count,
        }
    }

    fn slug_only(value: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("slug".into(), Value::String(value.into()));
        map
    }

    fn slugs(aggregate: &PresentedAggregate) -> Vec<&str> {
        aggregate.options.iter().filter_map(AggregateOption::slug).collect()
    }

    #[test]
    fn test_counts_and_missing_options() {
        let buckets = vec![bucket("guide", 5), bucket("answer", 3), bucket("news", 1)];
        let request = AggregateRequest::with_count(2);
        let aggregate = process_aggregate(&buckets, 7, &request, &[], slug_only);

        assert_eq!(slugs(&aggregate), vec!["guide", "answer"]);
        assert_eq!(aggregate.total_options, 3);
        assert_eq!(aggregate.missing_options, 1);
        assert_eq!(aggregate.documents_with_no_value, 7);
        assert_eq!(aggregate.scope, "exclude_field_filter");
    }

    #[test]
    fn test_applied_values_kept_and_pinned_first() {
        let buckets = vec![bucket("guide", 5), bucket("answer", 3)];
        let request = AggregateRequest::with_count(1);
        let applied = vec!["answer".to_string(), "transaction".to_string()];
        let aggregate = process_aggregate(&buckets, 0, &request, &applied, slug_only);

        assert_eq!(slugs(&aggregate), vec!["answer", "transaction"]);
        assert_eq!(aggregate.options[1].documents, 0);
        assert_eq!(aggregate.total_options, 3);
        assert_eq!(aggregate.missing_options, 1);

        let request = AggregateRequest::with_count(2);
        let aggregate = process_aggregate(&buckets, 0, &request, &applied, slug_only);
        assert_eq!(slugs(&aggregate), vec!["answer", "transaction", "guide"]);
    }

    #[test]
    fn test_rejected_value_stays_visible() {
        let parser = crate::params::SearchParameterParser::new(
            std::sync::Arc::new(crate::schema::SearchSchema::government()),
            crate::params::ParserLimits::default(),
        )
        .unwrap();
        let params = parser
            .parse(&crate::params::RawParams::from_query_string("reject_format=guide&aggregate_format=1"))
            .into_result()
            .unwrap();
        let buckets = vec![bucket("answer", 9), bucket("news", 4), bucket("guide", 2)];
        let aggregate = process_aggregate(
            &buckets,
            0,
            &params.aggregates["format"],
            &params.applied_values("format"),
            slug_only,
        );

        assert_eq!(slugs(&aggregate), vec!["guide"]);
        assert!(aggregate.options[0].applied);
        assert_eq!(aggregate.options[0].documents, 2);
        assert_eq!(aggregate.total_options, 3);
        assert_eq!(aggregate.missing_options, 2);
    }

    #[test]
    fn test_title_order_ignores_case() {
        let titles = BTreeMap::from([("a", "zebra"), ("b", "Apple"), ("c", "mango")]);
        let expand = |slug: &str| {
            let mut map = slug_only(slug);
            map.insert("title".into(), json!(titles[slug]));
            map
        };
        let mut request = AggregateRequest::with_count(10);
        request.order = vec![(AggregateSortKey::Title, SortDirection::Asc)];
        let buckets = vec![bucket("a", 1), bucket("b", 1), bucket("c", 9)];
        let aggregate = process_aggregate(&buckets, 0, &request, &[], expand);
        assert_eq!(slugs(&aggregate), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_count_ties_fall_back_to_slug() {
        let mut request = AggregateRequest::with_count(10);
        request.order = vec![(AggregateSortKey::Count, SortDirection::Desc)];
        let buckets = vec![bucket("b", 2), bucket("c", 2), bucket("a", 2), bucket("z", 4)];
        let aggregate = process_aggregate(&buckets, 0, &request, &[], slug_only);
        assert_eq!(slugs(&aggregate), vec!["z", "a", "b", "c"]);
    }

    #[test]
    fn test_zero_requested_keeps_only_applied() {
        let buckets = vec![bucket("guide", 5)];
        let request = AggregateRequest::with_count(0);
        let applied = vec!["guide".to_string()];
        let aggregate = process_aggregate(&buckets, 0, &request, &applied, slug_only);
        assert_eq!(slugs(&aggregate), vec!["guide"]);
        assert_eq!(aggregate.options[0].documents, 5);

        let aggregate = process_aggregate(&buckets, 0, &request, &[], slug_only);
        assert!(aggregate.options.is_empty());
        assert_eq!(aggregate.missing_options, 1);
    }

    #[test]
    fn test_present_aggregates_from_response() {
        let mut response = RawSearchResponse::default();
        response.aggregations.insert(
            "mainstream_browse_pages".into(),
            crate::engine::AggregationResult::Terms {
                buckets: vec![bucket("browse/page/1", 2), bucket("browse/page/2", 2)],
            },
        );
        response.aggregations.insert(
            "mainstream_browse_pages_with_missing_value".into(),
            crate::engine::AggregationResult::Missing { doc_count: 0 },
        );
        let mut all_filters = AggregateRequest::with_count(2);
        all_filters.scope = AggregateScope::AllFilters;
        let params = QueryParameters {
            aggregates: BTreeMap::from([("mainstream_browse_pages".to_string(), all_filters)]),
            ..Default::default()
        };
        let registries = RegistrySnapshot::empty();
        let presented = present_aggregates(&params, &response, &EntityExpander::new(&registries));
        let aggregate = &presented["mainstream_browse_pages"];

        assert_eq!(aggregate.total_options, 2);
        assert_eq!(aggregate.missing_options, 0);
        assert!(aggregate.options.iter().all(|o| o.documents == 2));
        assert_eq!(aggregate.scope, "all_filters");

        let body = serde_json::to_value(aggregate).unwrap();
        assert_eq!(body["options"][0], json!({"value": {"slug": "browse/page/1"}, "documents": 2}));
    }
}
