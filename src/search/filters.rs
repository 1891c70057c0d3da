// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter model → query nodes.
//!
//! ```text
//! Text  any  [a, b] + _MISSING → OR(terms [a, b], NOT exists)
//! Text  all  [a, b]            → AND(term a, term b)
//! DateRange                    → range
//! Boolean                      → term
//! negated                      → NOT(<whole filter>)
//! ```
//!
//! Negation applies to the combined filter, so `reject_format=a&reject_format=b`
//! excludes documents matching a OR b.

use super::query_builder::{Query, QueryBuilder, QueryNode};
use crate::params::{Filter, MultivalueMode, TextFilter};

/// Query node for one filter.
pub fn filter_node(filter: &Filter) -> QueryNode {
    let positive = match filter {
        Filter::Text(text) => text_node(text),
        Filter::DateRange(range) => Query::date_range(&range.field, range.from, range.to).root,
        Filter::Boolean(boolean) => QueryNode::boolean(&boolean.field, boolean.value),
    };
    if filter.is_negated() {
        QueryNode::Not(Box::new(positive))
    } else {
        positive
    }
}

fn text_node(filter: &TextFilter) -> QueryNode {
    let missing = || QueryNode::Not(Box::new(QueryNode::exists(&filter.field)));

    let mut alternatives = Vec::new();
    match filter.mode {
        MultivalueMode::Any => {
            if !filter.values.is_empty() {
                alternatives.push(QueryNode::terms(&filter.field, filter.values.clone()));
            }
        }
        MultivalueMode::All => {
            let all = filter
                .values
                .iter()
                .fold(QueryBuilder::new(), |builder, value| builder.term(&filter.field, value));
            if !all.is_empty() {
                alternatives.push(all.build_and().root);
            }
        }
    }
    if filter.include_missing {
        alternatives.push(missing());
    }

    match alternatives.len() {
        // an empty value list matches nothing
        0 => QueryNode::terms(&filter.field, Vec::new()),
        1 => alternatives.pop().unwrap_or(QueryNode::MatchAll),
        _ => QueryNode::Or(alternatives),
    }
}

/// All filters combined with AND; `None` when there are none.
pub fn combine_filters<'a>(filters: impl IntoIterator<Item = &'a Filter>) -> Option<Query> {
    let builder = filters
        .into_iter()
        .fold(QueryBuilder::new(), |builder, filter| builder.node(filter_node(filter)));
    (!builder.is_empty()).then(|| builder.build_and())
}
