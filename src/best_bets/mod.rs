// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Best and worst bets.
//!
//! Curated entries keyed by query text pin links to result positions (best
//! bets) or remove them (worst bets). An entry matches either exactly or on
//! stems:
//!
//! ```text
//! exact    normalised entry query == normalised user query
//! stemmed  entry stems appear, in order and adjacent, in the user's stems
//!          ("tax credit" matches "apply for tax credits", not "credit tax")
//! ```
//!
//! When any exact entry matches, stemmed entries are ignored entirely.

mod store;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::{self, Token};
use crate::engine::EngineError;

pub use store::{bet_document, EngineBestBetStore, BEST_BET_TYPE, MAX_BET_ENTRIES};

/// Links to promote (by 1-based position) and to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionSet {
    pub best: BTreeMap<usize, Vec<String>>,
    pub worst: Vec<String>,
}

impl PromotionSet {
    pub fn is_empty(&self) -> bool {
        self.best.is_empty() && self.worst.is_empty()
    }

    /// Every promoted link, in position order.
    pub fn best_links(&self) -> impl Iterator<Item = &str> {
        self.best.values().flatten().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMatch {
    Exact,
    Stemmed,
}

impl QueryMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Stemmed => "stemmed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "exact" => Some(Self::Exact),
            "stemmed" => Some(Self::Stemmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestBet {
    pub link: String,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorstBet {
    pub link: String,
}

/// One curated entry as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetEntry {
    pub query: String,
    pub query_match: QueryMatch,
    pub best: Vec<BestBet>,
    pub worst: Vec<WorstBet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotedResult {
    pub query_match: QueryMatch,
    pub matched_terms: BTreeSet<String>,
    pub link: String,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemotedResult {
    pub query_match: QueryMatch,
    pub matched_terms: BTreeSet<String>,
    pub link: String,
}

/// Bets that apply to one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub promoted: Vec<PromotedResult>,
    pub demoted: Vec<DemotedResult>,
}

impl Resolution {
    /// Match type that produced the bets, if any applied.
    pub fn query_match(&self) -> Option<QueryMatch> {
        self.promoted
            .first()
            .map(|p| p.query_match)
            .or_else(|| self.demoted.first().map(|d| d.query_match))
    }

    /// Group promoted links by position.
    ///
    /// A link bet at several positions keeps only its lowest one. Demoted
    /// links are deduplicated in first-seen order.
    pub fn promotion_set(&self) -> PromotionSet {
        let mut ordered: Vec<(usize, &str)> = self
            .promoted
            .iter()
            .map(|p| (p.position, p.link.as_str()))
            .collect();
        ordered.sort_unstable();

        let mut seen = BTreeSet::new();
        let mut best: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (position, link) in ordered {
            if seen.insert(link) {
                best.entry(position).or_default().push(link.to_string());
            }
        }

        let mut worst: Vec<String> = Vec::new();
        for demoted in &self.demoted {
            if !worst.contains(&demoted.link) {
                worst.push(demoted.link.clone());
            }
        }
        PromotionSet { best, worst }
    }
}

/// True when the `needle` tokens occur in `haystack` in order, at the same
/// relative positions.
fn contains_run(haystack: &[Token], needle: &[Token]) -> bool {
    let Some(first) = needle.first() else {
        return false;
    };
    haystack.iter().filter(|t| t.term == first.term).any(|start| {
        needle.iter().all(|n| {
            let position = start.position + n.position - first.position;
            haystack.iter().any(|t| t.position == position && t.term == n.term)
        })
    })
}

/// Select the entries that apply to `query` and flatten them into results.
pub fn resolve(query: &str, entries: &[BetEntry]) -> Resolution {
    let normalized = analysis::normalize_query(query);
    let exact: Vec<&BetEntry> = entries
        .iter()
        .filter(|e| e.query_match == QueryMatch::Exact)
        .filter(|e| analysis::normalize_query(&e.query) == normalized)
        .take(1)
        .collect();

    let selected = if exact.is_empty() {
        let query_tokens = analysis::analyze(query);
        entries
            .iter()
            .filter(|e| e.query_match == QueryMatch::Stemmed)
            .filter(|e| contains_run(&query_tokens, &analysis::analyze(&e.query)))
            .collect()
    } else {
        exact
    };

    let mut resolution = Resolution::default();
    for entry in selected {
        let matched_terms: BTreeSet<String> = analysis::terms(&entry.query).into_iter().collect();
        for bet in &entry.best {
            resolution.promoted.push(PromotedResult {
                query_match: entry.query_match,
                matched_terms: matched_terms.clone(),
                link: bet.link.clone(),
                position: bet.position,
            });
        }
        for bet in &entry.worst {
            resolution.demoted.push(DemotedResult {
                query_match: entry.query_match,
                matched_terms: matched_terms.clone(),
                link: bet.link.clone(),
            });
        }
    }
    resolution
}

/// Source of curated bet entries.
#[async_trait]
pub trait BestBetStore: Send + Sync {
    /// Entries that might apply to `query`; [`resolve`] makes the final choice.
    async fn candidates(&self, query: &str) -> Result<Vec<BetEntry>, EngineError>;

    async fn resolution(&self, query: &str) -> Result<Resolution, EngineError> {
        let entries = self.candidates(query).await?;
        Ok(resolve(query, &entries))
    }

    async fn lookup(&self, query: &str) -> Result<PromotionSet, EngineError> {
        Ok(self.resolution(query).await?.promotion_set())
    }
}
