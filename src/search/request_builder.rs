// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Builds a [`SearchRequest`] from validated parameters and resolved bets.
//!
//! ```text
//! query        similar_to → more_like_this
//!              no q       → match_all
//!              q          → best bets( popularity( format boost( text query )))
//!              + must_not is_withdrawn unless debug=include_withdrawn
//! post_filter  every filter, ANDed
//! aggs         per field: terms + missing, each under its scope filter
//! ```
//!
//! Filters go in the post filter so that aggregations see the unfiltered
//! query results and can apply their own scope.

use super::boosting;
use super::filters::combine_filters;
use super::query_builder::{BoolQuery, LikeDocument, MoreLikeThisQuery, Query, QueryNode};
use super::request::{
    Aggregation, AggregationKind, HighlightField, HighlightRequest, SearchRequest, SortClause,
    MISSING_AGGREGATION_SUFFIX, UNBOUNDED_BUCKETS,
};
use super::text_query::TextQuery;
use crate::best_bets::PromotionSet;
use crate::params::{AggregateScope, Filter, QueryParameters};
use crate::schema::VIRTUAL_FIELDS;

/// Fields fetched for every hit whether or not they are returned, so that
/// virtual and expanded fields can be computed.
pub const ALWAYS_FETCHED: &[&str] = &[
    "document_type",
    "title",
    "description",
    "organisation_content_ids",
    "topic_content_ids",
    "mainstream_browse_page_content_ids",
    "popularity",
    "format",
    "link",
    "public_timestamp",
    "updated_at",
];

pub const DEFAULT_DESCRIPTION_BUDGET: usize = 225;

pub const HIGHLIGHT_PRE_TAG: &str = "<mark>";
pub const HIGHLIGHT_POST_TAG: &str = "</mark>";

pub struct SearchRequestBuilder<'a> {
    params: &'a QueryParameters,
    bets: &'a PromotionSet,
    content_indexes: Vec<String>,
    description_budget: usize,
}

impl<'a> SearchRequestBuilder<'a> {
    pub fn new(params: &'a QueryParameters, bets: &'a PromotionSet) -> Self {
        Self {
            params,
            bets,
            content_indexes: Vec::new(),
            description_budget: DEFAULT_DESCRIPTION_BUDGET,
        }
    }

    /// Indexes a `similar_to` document is looked up in.
    pub fn content_indexes(mut self, indexes: &[String]) -> Self {
        self.content_indexes = indexes.to_vec();
        self
    }

    pub fn description_budget(mut self, budget: usize) -> Self {
        self.description_budget = budget;
        self
    }

    pub fn build(&self) -> SearchRequest {
        SearchRequest {
            from: self.params.start,
            size: self.params.count,
            source_fields: self.source_fields(),
            query: self.query(),
            post_filter: combine_filters(&self.params.filters),
            sort: self.sort(),
            aggregations: self.aggregations(),
            highlight: self.highlight(),
            explain: self.params.debug.explain,
        }
    }

    fn source_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        let requested = self.params.return_fields.iter().map(String::as_str);
        for field in requested.chain(ALWAYS_FETCHED.iter().copied()) {
            if !VIRTUAL_FIELDS.contains(&field) && !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
        fields
    }

    /// Scoring query including the withdrawn-content exclusion.
    pub fn query(&self) -> Query {
        let core = self.core_query();
        if self.params.debug.include_withdrawn {
            return Query::new(core);
        }
        Query::new(QueryNode::Bool(BoolQuery {
            must: vec![core],
            must_not: vec![QueryNode::boolean("is_withdrawn", true)],
            ..Default::default()
        }))
    }

    fn core_query(&self) -> QueryNode {
        if let Some(similar_to) = &self.params.similar_to {
            return QueryNode::MoreLikeThis(MoreLikeThisQuery {
                like: self
                    .content_indexes
                    .iter()
                    .map(|index| LikeDocument {
                        index: index.clone(),
                        id: similar_to.clone(),
                    })
                    .collect(),
            });
        }
        let Some(term) = self.params.search_term() else {
            return QueryNode::MatchAll;
        };

        let debug = self.params.debug;
        let mut text = TextQuery::new(term, self.params.quoted_search_phrase());
        if debug.disable_synonyms {
            text = text.without_synonyms();
        }
        let mut query = text.build();
        if !debug.disable_boosting {
            query = boosting::format_boost(query);
        }
        if !debug.disable_popularity {
            query = boosting::popularity_boost(query);
        }
        if !debug.disable_best_bets {
            query = boosting::best_bets(query, self.bets);
        }
        query
    }

    fn sort(&self) -> Vec<SortClause> {
        if self.params.similar_to.is_some() {
            return Vec::new();
        }
        self.params
            .order
            .iter()
            .map(|order| SortClause {
                field: order.field.clone(),
                direction: order.direction,
            })
            .collect()
    }

    fn aggregations(&self) -> Vec<Aggregation> {
        let mut aggregations = Vec::new();
        for (field, request) in &self.params.aggregates {
            let scoped: Vec<&Filter> = match request.scope {
                AggregateScope::ExcludeFieldFilter => self
                    .params
                    .filters
                    .iter()
                    .filter(|f| f.field() != field)
                    .collect(),
                AggregateScope::AllFilters => self.params.filters.iter().collect(),
            };
            let filter = combine_filters(scoped);
            aggregations.push(Aggregation {
                name: field.clone(),
                filter: filter.clone(),
                kind: AggregationKind::Terms {
                    field: field.clone(),
                    size: UNBOUNDED_BUCKETS,
                },
            });
            aggregations.push(Aggregation {
                name: format!("{field}{MISSING_AGGREGATION_SUFFIX}"),
                filter,
                kind: AggregationKind::Missing {
                    field: field.clone(),
                },
            });
        }
        aggregations
    }

    fn highlight(&self) -> Option<HighlightRequest> {
        self.params.query.as_ref()?;
        let mut fields = Vec::new();
        if self.params.field_requested("title_with_highlighting") {
            fields.push(HighlightField {
                name: "title".into(),
                fragment_size: None,
                number_of_fragments: 0,
            });
        }
        if self.params.field_requested("description_with_highlighting") {
            fields.push(HighlightField {
                name: "description".into(),
                fragment_size: Some(self.description_budget),
                number_of_fragments: 1,
            });
        }
        (!fields.is_empty()).then(|| HighlightRequest {
            fields,
            pre_tag: HIGHLIGHT_PRE_TAG.into(),
            post_tag: HIGHLIGHT_POST_TAG.into(),
            encode_html: true,
        })
    }
}
