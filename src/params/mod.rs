// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Parameter parsing.
//!
//! Turns untrusted query-string parameters into a validated
//! [`QueryParameters`] value.
//!
//! # Architecture
//!
//! ```text
//! query string
//!     ↓ RawParams (ordered multimap)
//! SearchParameterParser
//!     ├─→ ParameterTable   filter_/reject_/aggregate_/facet_ prefixes
//!     ├─→ filter model     Text / DateRange / Boolean
//!     └─→ aggregate parser count + key:value options
//!     ↓
//! ParseOutcome { params, error }
//! ```
//!
//! A parameter set that passed validation never holds an unknown field name,
//! an out-of-range integer or a malformed filter.

mod aggregate;
mod error;
mod filter;
mod parser;
mod prefix;
mod raw;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use aggregate::{
    parse_aggregate, AggregateRequest, AggregateScope, AggregateSortKey, AggregateSurface,
    ExampleScope,
};
pub use error::{quoted_list, ParseError, Problems, MAX_INTEGER};
pub use filter::{
    parse_boolean_filter, parse_date_bound, parse_date_filter, BooleanFilter, DateRangeFilter,
    Filter, MultivalueMode, TextFilter,
};
pub use parser::{ParseOutcome, ParserLimits, SearchParameterParser};
pub use prefix::{ParamKind, ParameterTable};
pub use raw::RawParams;

use crate::schema::SearchSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Result ordering: engine field plus direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// Named debug switches from `debug=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugOptions {
    pub disable_best_bets: bool,
    pub disable_popularity: bool,
    pub disable_synonyms: bool,
    pub disable_boosting: bool,
    pub explain: bool,
    pub include_withdrawn: bool,
    pub show_query: bool,
    pub use_id_codes: bool,
}

impl DebugOptions {
    /// Set the flag named by `token`; `false` for an unknown name.
    pub fn enable(&mut self, token: &str) -> bool {
        let flag = match token {
            "disable_best_bets" => &mut self.disable_best_bets,
            "disable_popularity" => &mut self.disable_popularity,
            "disable_synonyms" => &mut self.disable_synonyms,
            "disable_boosting" => &mut self.disable_boosting,
            "explain" => &mut self.explain,
            "include_withdrawn" => &mut self.include_withdrawn,
            "show_query" => &mut self.show_query,
            "use_id_codes" => &mut self.use_id_codes,
            _ => return false,
        };
        *flag = true;
        true
    }
}

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pub start: usize,
    pub count: usize,
    /// Free text; keeps enclosing quotes when the whole query is one phrase
    pub query: Option<String>,
    pub similar_to: Option<String>,
    pub order: Option<SortOrder>,
    pub return_fields: Vec<String>,
    pub filters: Vec<Filter>,
    pub aggregates: BTreeMap<String, AggregateRequest>,
    /// Which spelling (`aggregate_` / `facet_`) the request used
    pub aggregate_surface: AggregateSurface,
    pub debug: DebugOptions,
    pub suggest: Vec<String>,
    pub ab_tests: BTreeMap<String, String>,
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self {
            start: 0,
            count: 10,
            query: None,
            similar_to: None,
            order: None,
            return_fields: SearchSchema::government().default_return_fields().to_vec(),
            filters: Vec::new(),
            aggregates: BTreeMap::new(),
            aggregate_surface: AggregateSurface::Aggregates,
            debug: DebugOptions::default(),
            suggest: Vec::new(),
            ab_tests: BTreeMap::new(),
        }
    }
}

impl QueryParameters {
    /// The query is one double-quoted phrase with no embedded quotes.
    pub fn quoted_search_phrase(&self) -> bool {
        self.query.as_deref().is_some_and(|q| {
            let q = q.trim();
            q.len() > 2
                && q.starts_with('"')
                && q.ends_with('"')
                && !q[1..q.len() - 1].contains('"')
        })
    }

    /// Query text without the enclosing phrase quotes.
    pub fn search_term(&self) -> Option<&str> {
        let q = self.query.as_deref()?;
        if self.quoted_search_phrase() {
            Some(q.trim().trim_matches('"'))
        } else {
            Some(q)
        }
    }

    pub fn field_requested(&self, name: &str) -> bool {
        self.return_fields.iter().any(|f| f == name)
    }

    /// Values of every text filter on `field`, rejected ones included, in
    /// first-seen order.
    pub fn applied_values(&self, field: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for filter in &self.filters {
            let Filter::Text(t) = filter else {
                continue;
            };
            if t.field != field {
                continue;
            }
            for value in &t.values {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        values
    }

    /// Spelling suggestions were requested for a text query.
    pub fn suggest_spelling(&self) -> bool {
        self.query.is_some()
            && self
                .suggest
                .iter()
                .any(|s| s == "spelling" || s == "spelling_with_highlighting")
    }

    pub fn suggest_with_highlighting(&self) -> bool {
        self.suggest.iter().any(|s| s == "spelling_with_highlighting")
    }
}
