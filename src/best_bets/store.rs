// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bet entries stored as documents in the metasearch index.
//!
//! Each entry is a `best_bet` document with id `<query>-<exact|stemmed>`
//! whose `details` field holds `{best_bets: [{link, position}], worst_bets:
//! [{link}]}`, either as an object or as an encoded JSON string.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{BestBet, BestBetStore, BetEntry, QueryMatch, WorstBet};
use crate::engine::{EngineError, SearchEngine};
use crate::search::{BoolQuery, MatchOptions, Query, QueryNode, SearchRequest};

/// Document type of bet entries.
pub const BEST_BET_TYPE: &str = "best_bet";

/// Upper bound on candidate entries fetched per query.
pub const MAX_BET_ENTRIES: usize = 1000;

#[derive(Debug, Default, Deserialize)]
struct BetDetails {
    #[serde(default)]
    best_bets: Vec<BestBet>,
    #[serde(default)]
    worst_bets: Vec<WorstBet>,
}

pub struct EngineBestBetStore {
    engine: Arc<dyn SearchEngine>,
    index: String,
}

impl EngineBestBetStore {
    pub fn new(engine: Arc<dyn SearchEngine>, index: impl Into<String>) -> Self {
        Self {
            engine,
            index: index.into(),
        }
    }

    fn candidate_request(query: &str) -> SearchRequest {
        let lookup = QueryNode::Bool(BoolQuery {
            should: vec![
                QueryNode::text_match("exact_query", query, MatchOptions::default()),
                QueryNode::text_match("stemmed_query", query, MatchOptions::default()),
            ],
            ..Default::default()
        });
        let mut request = SearchRequest::new(Query::new(lookup), MAX_BET_ENTRIES);
        request.post_filter = Some(Query::term("document_type", BEST_BET_TYPE));
        request.source_fields = vec!["details".into()];
        request
    }
}

/// Storage form of an entry: document id and source.
pub fn bet_document(entry: &BetEntry) -> (String, Value) {
    let id = format!("{}-{}", entry.query, entry.query_match.as_str());
    let query_field = match entry.query_match {
        QueryMatch::Exact => "exact_query",
        QueryMatch::Stemmed => "stemmed_query",
    };
    let details = json!({
        "best_bets": entry.best,
        "worst_bets": entry.worst,
    });
    let source = json!({
        query_field: entry.query,
        "document_type": BEST_BET_TYPE,
        "details": details.to_string(),
    });
    (id, source)
}

fn parse_details(raw: Option<&Value>) -> Option<BetDetails> {
    match raw? {
        Value::String(encoded) => serde_json::from_str(encoded).ok(),
        Value::Array(items) => parse_details(items.first()),
        details @ Value::Object(_) => serde_json::from_value(details.clone()).ok(),
        _ => None,
    }
}

fn parse_entry(id: &str, source: &Map<String, Value>) -> Option<BetEntry> {
    let (query, kind) = id.rsplit_once('-')?;
    let query_match = QueryMatch::parse(kind)?;
    let details = parse_details(source.get("details"))?;
    Some(BetEntry {
        query: query.to_string(),
        query_match,
        best: details.best_bets,
        worst: details.worst_bets,
    })
}

#[async_trait]
impl BestBetStore for EngineBestBetStore {
    async fn candidates(&self, query: &str) -> Result<Vec<BetEntry>, EngineError> {
        let request = Self::candidate_request(query);
        let response = self
            .engine
            .search(std::slice::from_ref(&self.index), &request)
            .await?;

        let entries: Vec<BetEntry> = response
            .hits
            .iter()
            .filter_map(|hit| {
                let entry = parse_entry(&hit.id, &hit.source);
                if entry.is_none() {
                    warn!(id = %hit.id, "Skipping malformed best bet entry");
                }
                entry
            })
            .collect();
        debug!(query, candidates = entries.len(), "Best bet candidates");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryEngine;
    use std::collections::BTreeMap;

    fn store_with(entries: &[BetEntry]) -> EngineBestBetStore {
        let engine = InMemoryEngine::new();
        for entry in entries {
            let (id, source) = bet_document(entry);
            engine.add_document("metasearch", BEST_BET_TYPE, &id, source);
        }
        engine.add_document(
            "metasearch",
            "edition",
            "/not-a-bet",
            json!({"exact_query": "passport", "details": "{}"}),
        );
        EngineBestBetStore::new(Arc::new(engine), "metasearch")
    }

    fn exact(query: &str, link: &str, position: usize) -> BetEntry {
        BetEntry {
            query: query.into(),
            query_match: QueryMatch::Exact,
            best: vec![BestBet { link: link.into(), position }],
            worst: vec![],
        }
    }

    #[tokio::test]
    async fn test_lookup_through_engine() {
        let store = store_with(&[
            exact("passport", "https://www.passport.service.gov.uk", 1),
            BetEntry {
                query: "passport renewal".into(),
                query_match: QueryMatch::Stemmed,
                best: vec![BestBet { link: "/renew-passport".into(), position: 2 }],
                worst: vec![WorstBet { link: "/old-passport".into() }],
            },
        ]);

        let set = store.lookup("passport").await.unwrap();
        assert_eq!(
            set.best,
            BTreeMap::from([(1, vec!["https://www.passport.service.gov.uk".to_string()])])
        );

        let set = store.lookup("renewing passports").await.unwrap();
        assert!(set.is_empty());

        let set = store.lookup("passport renewals online").await.unwrap();
        assert_eq!(set.best, BTreeMap::from([(2, vec!["/renew-passport".to_string()])]));
        assert_eq!(set.worst, vec!["/old-passport"]);
    }

    #[tokio::test]
    async fn test_unknown_index_has_no_bets() {
        let store = EngineBestBetStore::new(Arc::new(InMemoryEngine::new()), "metasearch");
        assert!(store.lookup("anything").await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_entry_forms() {
        let object = json!({"details": {"best_bets": [{"link": "/a", "position": 1}]}});
        let entry = parse_entry("vat-exact", object.as_object().unwrap()).unwrap();
        assert_eq!(entry.query, "vat");
        assert_eq!(entry.best[0].link, "/a");

        let hyphenated = json!({"details": ["{\"worst_bets\": [{\"link\": \"/b\"}]}"]});
        let entry = parse_entry("self-assessment-stemmed", hyphenated.as_object().unwrap()).unwrap();
        assert_eq!(entry.query, "self-assessment");
        assert_eq!(entry.query_match, QueryMatch::Stemmed);
        assert_eq!(entry.worst[0].link, "/b");

        let bad = json!({"details": "not json"});
        assert!(parse_entry("vat-exact", bad.as_object().unwrap()).is_none());
        assert!(parse_entry("vat-fuzzy", object.as_object().unwrap()).is_none());
    }
}
