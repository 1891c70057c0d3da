// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Score wrappers applied around the core text query.
//!
//! ```text
//! best bets( popularity( format boost( text query ) ) )
//! ```

use super::query_builder::{BoolQuery, FunctionScoreQuery, QueryNode, ScoreFunction};
use crate::best_bets::PromotionSet;

/// Per-format score multipliers.
pub const FORMAT_BOOSTS: &[(&str, f64)] = &[
    ("organisation", 2.5),
    ("minister", 1.7),
    ("smart-answer", 1.5),
    ("transaction", 1.5),
    ("topical_event", 1.5),
    ("topic", 1.5),
    ("operational_field", 1.5),
    ("document_series", 1.3),
    ("document_collection", 1.3),
    ("contact", 0.3),
    ("mainstream_browse_page", 0.0),
];

pub const CLOSED_ORGANISATION_BOOST: f64 = 0.3;
pub const HISTORIC_BOOST: f64 = 0.5;

/// Score for the lowest best-bet position; higher positions get multiples.
pub const BEST_BET_BOOST: f64 = 1_000_000.0;

/// Multiply scores by format, closed-organisation and historic weights.
pub fn format_boost(query: QueryNode) -> QueryNode {
    let mut functions: Vec<ScoreFunction> = FORMAT_BOOSTS
        .iter()
        .map(|(format, weight)| ScoreFunction::Weight {
            filter: QueryNode::term("format", *format),
            weight: *weight,
        })
        .collect();
    functions.push(ScoreFunction::Weight {
        filter: QueryNode::term("organisation_state", "closed"),
        weight: CLOSED_ORGANISATION_BOOST,
    });
    functions.push(ScoreFunction::Weight {
        filter: QueryNode::boolean("is_historic", true),
        weight: HISTORIC_BOOST,
    });
    QueryNode::FunctionScore(FunctionScoreQuery {
        query: Box::new(query),
        functions,
    })
}

/// Multiply scores by `log10(2 + popularity)`.
pub fn popularity_boost(query: QueryNode) -> QueryNode {
    QueryNode::FunctionScore(FunctionScoreQuery {
        query: Box::new(query),
        functions: vec![ScoreFunction::FieldValueFactor {
            field: "popularity".into(),
            missing: 0.0,
        }],
    })
}

/// Pin best-bet links above everything else and drop worst-bet links.
///
/// Each position gets a constant score above any organic score, highest for
/// position 1, so the links sort in position order ahead of organic results
/// and match even when the organic query does not.
pub fn best_bets(query: QueryNode, bets: &PromotionSet) -> QueryNode {
    if bets.is_empty() {
        return query;
    }
    let max_position = bets.best.keys().copied().max().unwrap_or(0);

    let mut should = vec![query];
    for (position, links) in &bets.best {
        should.push(QueryNode::ConstantScore {
            filter: Box::new(QueryNode::terms("link", links.clone())),
            boost: (max_position - position + 1) as f64 * BEST_BET_BOOST,
        });
    }
    let must_not = if bets.worst.is_empty() {
        Vec::new()
    } else {
        vec![QueryNode::terms("link", bets.worst.clone())]
    };

    QueryNode::Bool(BoolQuery {
        should,
        must_not,
        ..Default::default()
    })
}
