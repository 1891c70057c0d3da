// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reference expansion.
//!
//! ```text
//! organisations: ["hm-revenue-customs"]
//!   → organisations: [{"slug": "hm-revenue-customs", "title": "HMRC", "link": ...}]
//!
//! organisation_content_ids: ["6667cce2"]
//!   → expanded_organisations: [{"content_id": "6667cce2", "title": "HMRC", ...}]
//! ```
//!
//! References the registry does not know are left out of the expanded list.
//! Source fields holding raw ids are never modified.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::params::QueryParameters;
use crate::registry::{RegistryIndex, RegistrySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Slug,
    ContentId,
}

/// Source field, registry it expands from, target field and lookup key.
const MAPPINGS: &[(&str, &str, &str, Lookup)] = &[
    ("document_series", "document_series", "document_series", Lookup::Slug),
    ("document_collections", "document_collections", "document_collections", Lookup::Slug),
    ("organisations", "organisations", "organisations", Lookup::Slug),
    ("policy_areas", "policy_areas", "policy_areas", Lookup::Slug),
    ("world_locations", "world_locations", "world_locations", Lookup::Slug),
    ("specialist_sectors", "specialist_sectors", "specialist_sectors", Lookup::Slug),
    ("people", "people", "people", Lookup::Slug),
    ("roles", "roles", "roles", Lookup::Slug),
    ("topic_content_ids", "specialist_sectors", "expanded_topics", Lookup::ContentId),
    ("organisation_content_ids", "organisations", "expanded_organisations", Lookup::ContentId),
];

/// Registries a search needs: those behind requested return fields and
/// behind aggregated fields.
pub fn required_registries(params: &QueryParameters) -> BTreeSet<&'static str> {
    MAPPINGS
        .iter()
        .filter(|(source, _, target, lookup)| {
            params.field_requested(target)
                || (*lookup == Lookup::Slug && params.aggregates.contains_key(*source))
        })
        .map(|(_, registry_name, _, _)| *registry_name)
        .collect()
}

/// Expands slug and content-id references against one registry snapshot.
pub struct EntityExpander<'a> {
    registries: &'a RegistrySnapshot,
}

impl<'a> EntityExpander<'a> {
    pub fn new(registries: &'a RegistrySnapshot) -> Self {
        Self { registries }
    }

    /// Replace or add the expanded form of every reference field in `result`.
    pub fn expand_result(&self, result: &mut Map<String, Value>) {
        for &(source, registry_name, target, lookup) in MAPPINGS {
            let Some(raw) = result.get(source) else {
                continue;
            };
            let Some(registry) = self.registries.get(registry_name) else {
                continue;
            };
            let Some(references) = reference_list(raw) else {
                warn!(field = source, "Unexpected reference field shape, not expanding");
                crate::metrics::record_decoration_failure(target);
                continue;
            };
            let expanded: Vec<Value> = references
                .iter()
                .filter_map(|reference| expand_one(registry, reference, lookup))
                .map(Value::Object)
                .collect();
            result.insert(target.to_string(), Value::Array(expanded));
        }
    }

    /// Expanded form of one aggregate value. Unknown values, and fields with
    /// no registry, come back as `{"slug": value}`.
    pub fn expand_value(&self, field: &str, slug: &str) -> Map<String, Value> {
        let found = MAPPINGS
            .iter()
            .find(|(source, _, _, lookup)| *source == field && *lookup == Lookup::Slug)
            .and_then(|(_, registry_name, _, _)| self.registries.get(registry_name))
            .and_then(|registry| expand_one(registry, slug, Lookup::Slug));
        found.unwrap_or_else(|| {
            let mut value = Map::new();
            value.insert("slug".into(), Value::String(slug.to_string()));
            value
        })
    }
}

/// Reference strings of a field: a list of strings, or a single string.
fn reference_list(raw: &Value) -> Option<Vec<String>> {
    match raw {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

fn expand_one(registry: &RegistryIndex, reference: &str, lookup: Lookup) -> Option<Map<String, Value>> {
    let (entry, key) = match lookup {
        Lookup::Slug => (registry.by_slug(reference)?, "slug"),
        Lookup::ContentId => (registry.by_content_id(reference)?, "content_id"),
    };
    let mut expanded = entry.clone();
    expanded.insert(key.to_string(), Value::String(reference.to_string()));
    Some(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn snapshot() -> RegistrySnapshot {
        RegistrySnapshot::from_entries([
            (
                "organisations",
                vec![obj(json!({
                    "slug": "hm-revenue-customs",
                    "content_id": "6667cce2",
                    "link": "/government/organisations/hm-revenue-customs",
                    "title": "HM Revenue & Customs",
                    "acronym": "HMRC"
                }))],
            ),
            (
                "specialist_sectors",
                vec![obj(json!({
                    "slug": "oil-and-gas/licensing",
                    "content_id": "b5f1d8a4",
                    "link": "/topic/oil-and-gas/licensing",
                    "title": "Licensing"
                }))],
            ),
        ])
    }

    #[test]
    fn test_expands_slugs_and_content_ids() {
        let registries = snapshot();
        let expander = EntityExpander::new(&registries);
        let mut result = obj(json!({
            "organisations": ["hm-revenue-customs"],
            "organisation_content_ids": ["6667cce2"],
            "topic_content_ids": ["b5f1d8a4"],
        }));
        expander.expand_result(&mut result);

        assert_eq!(result["organisations"][0]["acronym"], "HMRC");
        assert_eq!(result["organisations"][0]["slug"], "hm-revenue-customs");
        assert_eq!(result["expanded_organisations"][0]["content_id"], "6667cce2");
        assert_eq!(result["expanded_topics"][0]["title"], "Licensing");
        assert_eq!(result["organisation_content_ids"], json!(["6667cce2"]));
    }

    #[test]
    fn test_unknown_references_are_omitted() {
        let registries = snapshot();
        let expander = EntityExpander::new(&registries);
        let mut result = obj(json!({
            "organisation_content_ids": ["6667cce2", "missing-id"],
            "organisations": ["no-such-org"],
        }));
        expander.expand_result(&mut result);

        assert_eq!(result["expanded_organisations"].as_array().unwrap().len(), 1);
        assert_eq!(result["organisations"], json!([]));
        assert_eq!(result["organisation_content_ids"], json!(["6667cce2", "missing-id"]));
    }

    #[test]
    fn test_missing_registry_leaves_field_alone() {
        let registries = RegistrySnapshot::empty();
        let expander = EntityExpander::new(&registries);
        let mut result = obj(json!({"people": ["jane-doe"]}));
        expander.expand_result(&mut result);
        assert_eq!(result["people"], json!(["jane-doe"]));
    }

    #[test]
    fn test_malformed_field_is_skipped() {
        let registries = snapshot();
        let expander = EntityExpander::new(&registries);
        let mut result = obj(json!({"organisation_content_ids": {"id": 1}}));
        expander.expand_result(&mut result);
        assert!(result.get("expanded_organisations").is_none());
    }

    #[test]
    fn test_expand_value() {
        let registries = snapshot();
        let expander = EntityExpander::new(&registries);
        assert_eq!(
            expander.expand_value("organisations", "hm-revenue-customs")["title"],
            "HM Revenue & Customs"
        );
        assert_eq!(
            Value::Object(expander.expand_value("format", "guide")),
            json!({"slug": "guide"})
        );
        assert_eq!(
            Value::Object(expander.expand_value("organisations", "unknown")),
            json!({"slug": "unknown"})
        );
    }

    #[test]
    fn test_required_registries_follow_fields_and_aggregates() {
        let mut params = QueryParameters {
            return_fields: vec!["title".into(), "link".into()],
            ..Default::default()
        };
        assert!(required_registries(&params).is_empty());

        params.return_fields.push("expanded_organisations".into());
        params.return_fields.push("people".into());
        params
            .aggregates
            .insert("specialist_sectors".into(), crate::params::AggregateRequest::with_count(5));
        params
            .aggregates
            .insert("format".into(), crate::params::AggregateRequest::with_count(5));
        assert_eq!(
            required_registries(&params),
            BTreeSet::from(["organisations", "people", "specialist_sectors"])
        );
    }
}
