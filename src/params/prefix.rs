// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Declarative table of field-prefixed parameter names.
//!
//! ```text
//! filter_all_<field>   → Filter { negated: false, mode: All }   (specialist only)
//! filter_any_<field>   → Filter { negated: false, mode: Any }   (specialist only)
//! reject_all_<field>   → Filter { negated: true,  mode: All }   (specialist only)
//! reject_any_<field>   → Filter { negated: true,  mode: Any }   (specialist only)
//! filter_<field>       → Filter { negated: false, mode: Any }
//! reject_<field>       → Filter { negated: true,  mode: Any }
//! aggregate_<field>    → Aggregate(Aggregates)
//! facet_<field>        → Aggregate(Facets)
//! ```
//!
//! Longer prefixes are matched first, so `filter_all_format` never reads as
//! a filter on a field called `all_format` where the long forms are enabled.

use super::aggregate::AggregateSurface;
use super::filter::MultivalueMode;
use crate::schema::SearchSchema;

/// What a prefixed parameter builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Filter { negated: bool, mode: MultivalueMode },
    Aggregate(AggregateSurface),
}

impl ParamKind {
    /// Word used in "is not a valid ... field" messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Filter { negated: false, .. } => "filter",
            Self::Filter { negated: true, .. } => "reject",
            Self::Aggregate(surface) => surface.noun(),
        }
    }
}

const BASE_RULES: &[(&str, ParamKind)] = &[
    ("filter_", ParamKind::Filter { negated: false, mode: MultivalueMode::Any }),
    ("reject_", ParamKind::Filter { negated: true, mode: MultivalueMode::Any }),
    ("aggregate_", ParamKind::Aggregate(AggregateSurface::Aggregates)),
    ("facet_", ParamKind::Aggregate(AggregateSurface::Facets)),
];

const MULTIVALUE_RULES: &[(&str, ParamKind)] = &[
    ("filter_all_", ParamKind::Filter { negated: false, mode: MultivalueMode::All }),
    ("filter_any_", ParamKind::Filter { negated: false, mode: MultivalueMode::Any }),
    ("reject_all_", ParamKind::Filter { negated: true, mode: MultivalueMode::All }),
    ("reject_any_", ParamKind::Filter { negated: true, mode: MultivalueMode::Any }),
];

/// Prefix rules for one search surface.
#[derive(Debug, Clone)]
pub struct ParameterTable {
    rules: Vec<(&'static str, ParamKind)>,
}

impl ParameterTable {
    /// Rules enabled by the schema, longest prefix first.
    pub fn for_schema(schema: &SearchSchema) -> Self {
        let mut rules: Vec<(&'static str, ParamKind)> = BASE_RULES.to_vec();
        if schema.multivalue_filters() {
            rules.extend_from_slice(MULTIVALUE_RULES);
        }
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { rules }
    }

    /// Split a parameter name into its kind and field.
    pub fn classify<'a>(&self, name: &'a str) -> Option<(ParamKind, &'a str)> {
        self.rules
            .iter()
            .find_map(|(prefix, kind)| name.strip_prefix(prefix).map(|field| (*kind, field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_surface_has_no_multivalue_forms() {
        let table = ParameterTable::for_schema(&SearchSchema::government());
        assert_eq!(
            table.classify("filter_all_format"),
            Some((
                ParamKind::Filter { negated: false, mode: MultivalueMode::Any },
                "all_format"
            ))
        );
    }

    #[test]
    fn test_specialist_surface_prefers_longest_prefix() {
        let table = ParameterTable::for_schema(&SearchSchema::specialist());
        assert_eq!(
            table.classify("reject_all_format"),
            Some((
                ParamKind::Filter { negated: true, mode: MultivalueMode::All },
                "format"
            ))
        );
        assert_eq!(
            table.classify("facet_organisations"),
            Some((ParamKind::Aggregate(AggregateSurface::Facets), "organisations"))
        );
        assert_eq!(table.classify("count"), None);
    }
}
