// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The search parameter parser.
//!
//! Parameters are processed in a fixed order so the reported error is stable:
//!
//! ```text
//! start, count → q → similar_to → order → fields → filters → aggregates
//!   → debug → suggest → ab_tests → q/similar_to conflict → unknown names
//! ```
//!
//! Every still-valid parameter is kept in [`ParseOutcome::params`] even when
//! the request as a whole is rejected.

use std::sync::Arc;

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use super::aggregate::{parse_aggregate, AggregateSurface};
use super::error::{quoted_list, ParseError, Problems};
use super::filter::{parse_boolean_filter, parse_date_filter, Filter, TextFilter};
use super::prefix::{ParamKind, ParameterTable};
use super::raw::RawParams;
use super::{DebugOptions, QueryParameters, SortDirection, SortOrder};
use crate::schema::{FilterKind, SchemaError, SearchSchema};

/// Names accepted outside the prefixed filter/aggregate families.
const KNOWN_PARAMETERS: &[&str] = &[
    "start",
    "count",
    "q",
    "similar_to",
    "order",
    "fields",
    "debug",
    "suggest",
    "ab_tests",
    "c",
];

/// Request-size ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_count: usize,
    pub max_query_words: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_count: 1000,
            max_query_words: 1024,
        }
    }
}

/// Parsed parameters plus the single error reported for the request.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Every parameter that parsed, even when `error` is set
    pub params: QueryParameters,
    pub error: Option<ParseError>,
}

impl ParseOutcome {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<QueryParameters, ParseError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.params),
        }
    }
}

/// Validates raw query-string parameters against one schema.
#[derive(Debug, Clone)]
pub struct SearchParameterParser {
    schema: Arc<SearchSchema>,
    table: ParameterTable,
    limits: ParserLimits,
}

impl SearchParameterParser {
    /// Build a parser, validating the schema's allow-lists first.
    pub fn new(schema: Arc<SearchSchema>, limits: ParserLimits) -> Result<Self, SchemaError> {
        schema.validate()?;
        let table = ParameterTable::for_schema(&schema);
        Ok(Self {
            schema,
            table,
            limits,
        })
    }

    pub fn schema(&self) -> &Arc<SearchSchema> {
        &self.schema
    }

    pub fn parse(&self, raw: &RawParams) -> ParseOutcome {
        let mut problems = Problems::new();
        let mut params = QueryParameters {
            return_fields: self.schema.default_return_fields().to_vec(),
            ..Default::default()
        };

        if let Some(value) = single(raw, "start", &mut problems) {
            params.start = problems
                .integer(value, "parameter \"start\"")
                .unwrap_or(0);
        }
        if let Some(value) = single(raw, "count", &mut problems) {
            if let Some(count) = problems.integer(value, "parameter \"count\"") {
                if count > self.limits.max_count {
                    problems.push(format!(
                        "Maximum result set size (as specified in 'count') is {}",
                        self.limits.max_count
                    ));
                    params.count = self.limits.max_count;
                } else {
                    params.count = count;
                }
            }
        }

        params.query = single(raw, "q", &mut problems).and_then(normalize_text);
        if let Some(query) = &params.query {
            if query.split_whitespace().count() > self.limits.max_query_words {
                problems.bad_request(format!(
                    "Query must be less than {} words",
                    self.limits.max_query_words
                ));
            }
        }
        params.similar_to = single(raw, "similar_to", &mut problems).and_then(normalize_text);

        let order = single(raw, "order", &mut problems);
        if params.similar_to.is_none() {
            params.order = order.and_then(|value| self.parse_order(value, &mut problems));
        }

        if raw.contains("fields") {
            params.return_fields = self.parse_return_fields(raw.get("fields"), &mut problems);
        }

        params.filters = self.parse_filters(raw, &mut problems);
        self.parse_aggregates(raw, &mut params, &mut problems);

        params.debug = parse_debug(raw.get("debug"), &mut problems);
        params.suggest = comma_separated(raw.get("suggest")).collect();
        params.ab_tests = parse_ab_tests(raw.get("ab_tests"), &mut problems);

        if params.query.is_some() && params.similar_to.is_some() {
            problems.push("Parameters 'q' and 'similar_to' cannot be used together");
        }

        for name in raw.names() {
            if !KNOWN_PARAMETERS.contains(&name) && self.table.classify(name).is_none() {
                problems.unknown(name);
            }
        }

        for message in problems.messages() {
            debug!(problem = %message, "search parameter rejected");
        }
        ParseOutcome {
            params,
            error: problems.into_error(),
        }
    }

    fn parse_order(&self, value: &str, problems: &mut Problems) -> Option<SortOrder> {
        let (name, direction) = match value.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Desc),
            None => (value, SortDirection::Asc),
        };
        match self.schema.sort_field(name) {
            Some(field) => Some(SortOrder {
                field: field.to_string(),
                direction,
            }),
            None => {
                problems.push(format!("\"{name}\" is not a valid sort field"));
                None
            }
        }
    }

    fn parse_return_fields(&self, values: &[String], problems: &mut Problems) -> Vec<String> {
        let mut valid: Vec<String> = Vec::new();
        let mut invalid: Vec<String> = Vec::new();
        for name in comma_separated(values) {
            let bucket = if self.schema.is_return_field(&name) {
                &mut valid
            } else {
                &mut invalid
            };
            if !bucket.contains(&name) {
                bucket.push(name);
            }
        }
        if !invalid.is_empty() {
            problems.push(format!(
                "Some requested fields are not valid return fields: {}",
                quoted_list(&invalid)
            ));
        }
        valid
    }

    fn parse_filters(&self, raw: &RawParams, problems: &mut Problems) -> Vec<Filter> {
        let mut filters: Vec<Filter> = Vec::new();
        for (name, values) in raw.iter() {
            let Some((ParamKind::Filter { negated, mode }, requested)) = self.table.classify(name)
            else {
                continue;
            };
            let kind = ParamKind::Filter { negated, mode };
            let Some(filter_kind) = self.schema.filter_kind(requested) else {
                problems.push(format!("\"{requested}\" is not a valid {} field", kind.noun()));
                continue;
            };
            let field = self.schema.resolve_filter_name(requested);

            let filter = match filter_kind {
                FilterKind::Text => {
                    // aliases of one field share a single filter per operation
                    let existing = filters.iter_mut().find_map(|f| match f {
                        Filter::Text(t) if t.field == field && t.negated == negated && t.mode == mode => {
                            Some(t)
                        }
                        _ => None,
                    });
                    if let Some(text) = existing {
                        let extra = TextFilter::new(field, values, negated, mode);
                        text.include_missing |= extra.include_missing;
                        text.values.extend(extra.values);
                        continue;
                    }
                    Some(Filter::Text(TextFilter::new(field, values, negated, mode)))
                }
                FilterKind::Date => {
                    parse_date_filter(field, values, negated, problems).map(Filter::DateRange)
                }
                FilterKind::Boolean => {
                    parse_boolean_filter(field, values, negated, problems).map(Filter::Boolean)
                }
            };
            filters.extend(filter);
        }
        filters
    }

    fn parse_aggregates(&self, raw: &RawParams, params: &mut QueryParameters, problems: &mut Problems) {
        let mut surface: Option<AggregateSurface> = None;
        let mut mixed = false;

        for (name, values) in raw.iter() {
            let Some((ParamKind::Aggregate(this_surface), field)) = self.table.classify(name) else {
                continue;
            };
            match surface {
                None => surface = Some(this_surface),
                Some(seen) if seen != this_surface && !mixed => {
                    mixed = true;
                    problems.push(
                        "aggregates can not be used in conjuction with facets, please switch to using aggregates as facets are deprecated.",
                    );
                }
                Some(_) => {}
            }

            if !self.schema.is_aggregatable(field) {
                problems.push(format!(
                    "\"{field}\" is not a valid {} field",
                    this_surface.noun()
                ));
                continue;
            }
            if values.len() > 1 {
                problems.push(format!(
                    "Too many values ({}) for parameter \"{name}\" (must occur at most once)",
                    values.len()
                ));
            }
            let value = values.first().map(String::as_str).unwrap_or("");
            if let Some(request) = parse_aggregate(field, value, this_surface, &self.schema, problems) {
                params.aggregates.insert(field.to_string(), request);
            }
        }
        params.aggregate_surface = surface.unwrap_or_default();
    }
}

/// First value of a parameter that may occur once.
fn single<'a>(raw: &'a RawParams, name: &str, problems: &mut Problems) -> Option<&'a str> {
    let values = raw.get(name);
    if values.len() > 1 {
        problems.push(format!(
            "Too many values ({}) for parameter \"{name}\" (must occur at most once)",
            values.len()
        ));
    }
    values.first().map(String::as_str)
}

/// NFKC-normalise and trim; blank text is absent.
fn normalize_text(text: &str) -> Option<String> {
    let normalized: String = text.nfkc().collect();
    let trimmed = normalized.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn comma_separated(values: &[String]) -> impl Iterator<Item = String> + '_ {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_debug(values: &[String], problems: &mut Problems) -> DebugOptions {
    let mut debug = DebugOptions::default();
    for token in comma_separated(values) {
        if !debug.enable(&token) {
            problems.push(format!("Unknown debug option \"{token}\""));
        }
    }
    debug
}

fn parse_ab_tests(
    values: &[String],
    problems: &mut Problems,
) -> std::collections::BTreeMap<String, String> {
    let mut tests = std::collections::BTreeMap::new();
    for entry in comma_separated(values) {
        match entry.split_once(':') {
            Some((name, variant)) if !variant.is_empty() => {
                tests.insert(name.to_string(), variant.to_string());
            }
            Some((name, _)) => problems.push(format!("Invalid ab_tests, missing type \"{name}\"")),
            None => problems.push(format!("Invalid ab_tests, missing type \"{entry}\"")),
        }
    }
    tests
}
