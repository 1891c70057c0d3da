// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Result presentation.
//!
//! # Architecture
//!
//! ```text
//! RawHit
//!   ├─→ single-valued fields unwrapped from engine arrays
//!   ├─→ virtual fields      title/description_with_highlighting
//!   ├─→ EntityExpander      slugs and content ids → registry objects
//!   ├─→ link fix            "foo" → "/foo"
//!   ├─→ projection          return_fields only, absent fields omitted
//!   └─→ debug values        index, es_score, _id, _explanation, types
//! ```
//!
//! A result whose optional decoration fails is still returned; only the
//! failing field is missing.

mod expansion;
mod highlight;

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::aggregates::PresentedAggregate;
use crate::engine::RawHit;
use crate::params::{AggregateSurface, QueryParameters};
use crate::registry::RegistrySnapshot;
use crate::schema::SearchSchema;
use crate::search::DEFAULT_DESCRIPTION_BUDGET;
use crate::suggest::Suggestion;

pub use expansion::{required_registries, EntityExpander};
pub use highlight::{highlighted_description, highlighted_title, ELLIPSIS};

pub struct ResultPresenter<'a> {
    params: &'a QueryParameters,
    schema: &'a SearchSchema,
    expander: Option<EntityExpander<'a>>,
    description_budget: usize,
}

impl<'a> ResultPresenter<'a> {
    pub fn new(
        params: &'a QueryParameters,
        schema: &'a SearchSchema,
        registries: &'a RegistrySnapshot,
    ) -> Self {
        Self {
            params,
            schema,
            expander: Some(EntityExpander::new(registries)),
            description_budget: DEFAULT_DESCRIPTION_BUDGET,
        }
    }

    /// Presenter that leaves references unexpanded.
    pub fn without_expansion(params: &'a QueryParameters, schema: &'a SearchSchema) -> Self {
        Self {
            params,
            schema,
            expander: None,
            description_budget: DEFAULT_DESCRIPTION_BUDGET,
        }
    }

    pub fn description_budget(mut self, budget: usize) -> Self {
        self.description_budget = budget;
        self
    }

    pub fn present_all(&self, hits: &[RawHit]) -> Vec<Value> {
        hits.iter().map(|hit| Value::Object(self.present(hit))).collect()
    }

    pub fn present(&self, hit: &RawHit) -> Map<String, Value> {
        let mut result = self.unwrap_single_values(&hit.source);

        if self.params.field_requested("title_with_highlighting") {
            if let Some(title) = highlighted_title(hit) {
                result.insert("title_with_highlighting".into(), Value::String(title));
            }
        }
        if self.params.field_requested("description_with_highlighting") {
            if let Some(description) = highlighted_description(hit, self.description_budget) {
                result.insert("description_with_highlighting".into(), Value::String(description));
            }
        }

        if let Some(expander) = &self.expander {
            expander.expand_result(&mut result);
        }
        fix_link(&mut result);
        result.retain(|field, _| self.params.field_requested(field));
        add_debug_values(&mut result, hit);
        result
    }

    /// Engines may return single-valued fields as one-element arrays.
    fn unwrap_single_values(&self, source: &Map<String, Value>) -> Map<String, Value> {
        source
            .iter()
            .map(|(field, value)| {
                let value = match value {
                    Value::Array(items)
                        if self.schema.field(field).is_some()
                            && !self.schema.is_multivalued(field) =>
                    {
                        items.first().cloned().unwrap_or(Value::Null)
                    }
                    other => other.clone(),
                };
                (field.clone(), value)
            })
            .collect()
    }
}

pub(crate) fn fix_link(result: &mut Map<String, Value>) {
    if let Some(Value::String(link)) = result.get_mut("link") {
        if !link.starts_with("http") && !link.starts_with('/') {
            link.insert(0, '/');
        }
    }
}

fn add_debug_values(result: &mut Map<String, Value>, hit: &RawHit) {
    if hit.index.is_empty() {
        return;
    }
    result.insert("index".into(), Value::String(hit.index.clone()));
    let score = hit
        .score
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number);
    result.insert("es_score".into(), score);
    result.insert("_id".into(), Value::String(hit.id.clone()));
    if let Some(explanation) = &hit.explanation {
        result.insert("_explanation".into(), explanation.clone());
    }
    result.insert("elasticsearch_type".into(), Value::String(hit.doc_type.clone()));
    result.insert("document_type".into(), Value::String(hit.doc_type.clone()));
}

/// Body of a `/search.json` response.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<Value>,
    pub total: u64,
    pub start: usize,
    /// Serialised under `aggregates` or `facets`, as the request spelled it
    pub aggregates: BTreeMap<String, PresentedAggregate>,
    pub surface: AggregateSurface,
    pub suggested_queries: Vec<Suggestion>,
    /// Engine payload, only with `debug=show_query`
    pub elasticsearch_query: Option<Value>,
}

impl Serialize for SearchResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 5 + usize::from(self.elasticsearch_query.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("results", &self.results)?;
        map.serialize_entry("total", &self.total)?;
        map.serialize_entry("start", &self.start)?;
        map.serialize_entry(self.surface.key(), &self.aggregates)?;
        map.serialize_entry("suggested_queries", &self.suggested_queries)?;
        if let Some(query) = &self.elasticsearch_query {
            map.serialize_entry("elasticsearch_query", query)?;
        }
        map.end()
    }
}
