// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Aggregate (facet) parameter parsing.
//!
//! ```text
//! aggregate_organisations=10,examples:3,example_scope:query,example_fields:link:title,order:-count
//!                         │  └────────────────────── key:value options ──────────────────────┘
//!                         └─ requested option count
//! ```
//!
//! `facet_<field>` is the legacy spelling of the same request; only the
//! wording of errors and the response key differ.

use std::collections::BTreeMap;

use super::error::{quoted_list, Problems};
use super::SortDirection;
use crate::schema::SearchSchema;

/// Which filters an aggregation is computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateScope {
    /// All filters except the aggregated field's own
    ExcludeFieldFilter,
    /// Every filter
    AllFilters,
}

impl AggregateScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExcludeFieldFilter => "exclude_field_filter",
            Self::AllFilters => "all_filters",
        }
    }
}

/// Which documents aggregate examples are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleScope {
    Global,
    Query,
}

/// Key an aggregate's options are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateSortKey {
    /// Whether the value is one of the applied filter values
    Filtered,
    Count,
    /// Title when known, slug otherwise
    Value,
    Slug,
    Title,
    Link,
}

impl AggregateSortKey {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "filtered" => Some(Self::Filtered),
            "count" => Some(Self::Count),
            "value" => Some(Self::Value),
            "value.slug" => Some(Self::Slug),
            "value.title" => Some(Self::Title),
            "value.link" => Some(Self::Link),
            _ => None,
        }
    }
}

/// Request-surface name: `aggregate_*` or legacy `facet_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateSurface {
    #[default]
    Aggregates,
    Facets,
}

impl AggregateSurface {
    /// Response key.
    pub fn key(self) -> &'static str {
        match self {
            Self::Aggregates => "aggregates",
            Self::Facets => "facets",
        }
    }

    /// Singular noun used in error messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Aggregates => "aggregate",
            Self::Facets => "facet",
        }
    }
}

/// One validated aggregation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRequest {
    pub requested: usize,
    pub order: Vec<(AggregateSortKey, SortDirection)>,
    pub scope: AggregateScope,
    pub examples: usize,
    pub example_scope: Option<ExampleScope>,
    pub example_fields: Vec<String>,
}

impl AggregateRequest {
    /// Default ordering: applied values first, then count descending, then slug.
    pub fn default_order() -> Vec<(AggregateSortKey, SortDirection)> {
        vec![
            (AggregateSortKey::Filtered, SortDirection::Asc),
            (AggregateSortKey::Count, SortDirection::Desc),
            (AggregateSortKey::Slug, SortDirection::Asc),
        ]
    }

    /// Request `n` options with every other setting at its default.
    pub fn with_count(requested: usize) -> Self {
        Self {
            requested,
            order: Self::default_order(),
            scope: AggregateScope::ExcludeFieldFilter,
            examples: 0,
            example_scope: None,
            example_fields: vec!["link".into(), "title".into()],
        }
    }
}

/// Parse the value of one `aggregate_<field>` parameter.
///
/// Returns `None` only when the requested count itself is unusable; other
/// problems are reported and replaced by defaults.
pub fn parse_aggregate(
    field: &str,
    value: &str,
    surface: AggregateSurface,
    schema: &SearchSchema,
    problems: &mut Problems,
) -> Option<AggregateRequest> {
    let noun = surface.noun();
    let context = format!(" in {noun} \"{field}\"");

    let mut parts = value.split(',');
    let first = parts.next().unwrap_or("");
    let requested = problems.integer(first, &format!("first parameter for {noun} \"{field}\""));

    let mut options: Vec<(String, Vec<String>)> = Vec::new();
    for part in parts {
        match part.split_once(':') {
            Some((key, val)) => match options.iter_mut().find(|(k, _)| k == key) {
                Some((_, vals)) => vals.push(val.to_string()),
                None => options.push((key.to_string(), vec![val.to_string()])),
            },
            None => problems.push(format!(
                "Invalid parameter \"{part}\"{context}; must be of form \"key:value\""
            )),
        }
    }
    let mut options: BTreeMap<String, Vec<String>> = options.into_iter().collect();

    let scope = match take_single(&mut options, "scope", &context, problems).as_deref() {
        None | Some("exclude_field_filter") => AggregateScope::ExcludeFieldFilter,
        Some("all_filters") => AggregateScope::AllFilters,
        Some(other) => {
            problems.push(format!("\"{other}\" is not a valid scope option{context}"));
            AggregateScope::ExcludeFieldFilter
        }
    };

    let mut order = Vec::new();
    for raw in options.remove("order").unwrap_or_default() {
        for key in raw.split(':') {
            let (name, direction) = match key.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (key, SortDirection::Asc),
            };
            match AggregateSortKey::parse(name) {
                Some(k) => order.push((k, direction)),
                None => problems.push(format!("\"{name}\" is not a valid sort option{context}")),
            }
        }
    }
    if order.is_empty() {
        order = AggregateRequest::default_order();
    }

    let mut examples = match take_single(&mut options, "examples", &context, problems) {
        Some(raw) => problems
            .integer(&raw, &format!("parameter \"examples\"{context}"))
            .unwrap_or(0),
        None => 0,
    };
    if examples != 0 && !schema.supports_examples(field) {
        problems.push(format!(
            "{} examples are not supported{context}",
            capitalise(noun)
        ));
        examples = 0;
    }

    let requested_fields: Vec<String> = options
        .remove("example_fields")
        .unwrap_or_default()
        .iter()
        .flat_map(|v| v.split(':'))
        .map(str::to_string)
        .collect();
    let example_fields = if requested_fields.is_empty() {
        vec!["link".to_string(), "title".to_string()]
    } else {
        let (allowed, disallowed): (Vec<String>, Vec<String>) = requested_fields
            .into_iter()
            .partition(|f| schema.is_return_field(f));
        if !disallowed.is_empty() {
            problems.push(format!(
                "Some requested fields are not valid return fields: {} in parameter \"example_fields\"{context}",
                quoted_list(&disallowed)
            ));
        }
        allowed
    };

    let example_scope = match take_single(&mut options, "example_scope", &context, problems).as_deref() {
        Some("global") => Some(ExampleScope::Global),
        Some("query") => Some(ExampleScope::Query),
        _ => None,
    };
    if examples > 0 && example_scope.is_none() {
        problems.push(
            "example_scope parameter must be set to 'query' or 'global' when requesting examples",
        );
        examples = 0;
    }

    if !options.is_empty() {
        let names: Vec<&str> = options.keys().map(String::as_str).collect();
        problems.push(format!("Unexpected options{context}: {}", names.join(", ")));
    }

    Some(AggregateRequest {
        requested: requested?,
        order,
        scope,
        examples,
        example_scope,
        example_fields,
    })
}

fn take_single(
    options: &mut BTreeMap<String, Vec<String>>,
    name: &str,
    context: &str,
    problems: &mut Problems,
) -> Option<String> {
    let values = options.remove(name)?;
    if values.len() > 1 {
        problems.push(format!(
            "Too many values ({}) for parameter \"{name}\"{context} (must occur at most once)",
            values.len()
        ));
    }
    values.into_iter().next()
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(field: &str, value: &str) -> (Option<AggregateRequest>, Option<String>) {
        let schema = SearchSchema::government();
        let mut p = Problems::new();
        let req = parse_aggregate(field, value, AggregateSurface::Aggregates, &schema, &mut p);
        (req, p.into_error().map(|e| e.message().to_string()))
    }

    #[test]
    fn test_plain_count() {
        let (req, err) = parse("organisations", "10");
        assert_eq!(req, Some(AggregateRequest::with_count(10)));
        assert_eq!(err, None);
    }

    #[test]
    fn test_full_options() {
        let (req, err) = parse(
            "organisations",
            "10,examples:5,example_fields:slug:title,example_scope:global,scope:all_filters,order:value.title:-count",
        );
        let req = req.unwrap();
        assert_eq!(err, None);
        assert_eq!(req.examples, 5);
        assert_eq!(req.example_scope, Some(ExampleScope::Global));
        assert_eq!(req.example_fields, vec!["slug", "title"]);
        assert_eq!(req.scope, AggregateScope::AllFilters);
        assert_eq!(
            req.order,
            vec![
                (AggregateSortKey::Title, SortDirection::Asc),
                (AggregateSortKey::Count, SortDirection::Desc)
            ]
        );
    }

    #[test]
    fn test_empty_count() {
        let (req, err) = parse("organisations", "");
        assert!(req.is_none());
        assert_eq!(
            err.as_deref(),
            Some("Invalid value \"\" for first parameter for aggregate \"organisations\" (expected positive integer)")
        );
    }

    #[test]
    fn test_option_without_colon() {
        let (_, err) = parse("organisations", "10,wibble");
        assert_eq!(
            err.as_deref(),
            Some("Invalid parameter \"wibble\" in aggregate \"organisations\"; must be of form \"key:value\"")
        );
    }

    #[test]
    fn test_examples_need_scope() {
        let (req, err) = parse("organisations", "10,examples:5");
        assert_eq!(req.unwrap().examples, 0);
        assert_eq!(
            err.as_deref(),
            Some("example_scope parameter must be set to 'query' or 'global' when requesting examples")
        );
    }

    #[test]
    fn test_examples_unsupported_field() {
        let (_, err) = parse("people", "10,examples:5,example_scope:global");
        assert_eq!(
            err.as_deref(),
            Some("Aggregate examples are not supported in aggregate \"people\"")
        );
    }

    #[test]
    fn test_bad_scope_and_sort() {
        let (_, err) = parse("organisations", "10,scope:everything");
        assert_eq!(
            err.as_deref(),
            Some("\"everything\" is not a valid scope option in aggregate \"organisations\"")
        );
        let (_, err) = parse("organisations", "10,order:filt");
        assert_eq!(
            err.as_deref(),
            Some("\"filt\" is not a valid sort option in aggregate \"organisations\"")
        );
    }

    #[test]
    fn test_unexpected_options_listed() {
        let (_, err) = parse("organisations", "10,foo:1,bar:2");
        assert_eq!(
            err.as_deref(),
            Some("Unexpected options in aggregate \"organisations\": bar, foo")
        );
    }

    #[test]
    fn test_facet_wording() {
        let schema = SearchSchema::government();
        let mut p = Problems::new();
        parse_aggregate("organisations", "x", AggregateSurface::Facets, &schema, &mut p);
        assert_eq!(
            p.into_error().unwrap().message(),
            "Invalid value \"x\" for first parameter for facet \"organisations\" (expected positive integer)"
        );
    }
}
