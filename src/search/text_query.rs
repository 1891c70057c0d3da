// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Free-text query construction.
//!
//! Unquoted text:
//!
//! ```text
//! bool
//! ├─ must:   dis_max(all_searchable_text, .synonym, .id_codes)   tie 0.1
//! └─ should: dis_max over title^5 acronym^5 description^2 indexable_content^1
//!            for each of: words, phrase, all terms, synonyms, shingles, id codes
//! ```
//!
//! A single quoted phrase only runs the phrase group.

use super::query_builder::{BoolQuery, MatchOptions, QueryNode};

/// Fields with their own weighted match, and the weight.
pub const MATCH_FIELDS: &[(&str, f64)] = &[
    ("title", 5.0),
    ("acronym", 5.0),
    ("description", 2.0),
    ("indexable_content", 1.0),
];

/// Combined field holding every searchable text field.
pub const ALL_SEARCHABLE_TEXT: &str = "all_searchable_text";

/// 3-5 terms may miss one, 6-7 may miss two, 8 or more need 75%.
pub const MINIMUM_SHOULD_MATCH: &str = "2<-1 5<-2 7<75%";

const MUST_TIE_BREAKER: f64 = 0.1;

/// Builds the scoring query for a search term.
#[derive(Debug, Clone, Copy)]
pub struct TextQuery<'a> {
    term: &'a str,
    quoted: bool,
    synonyms: bool,
}

impl<'a> TextQuery<'a> {
    /// `term` is the query without its enclosing phrase quotes.
    pub fn new(term: &'a str, quoted: bool) -> Self {
        Self {
            term,
            quoted,
            synonyms: true,
        }
    }

    pub fn without_synonyms(mut self) -> Self {
        self.synonyms = false;
        self
    }

    pub fn build(&self) -> QueryNode {
        if self.quoted {
            return self.phrase_group();
        }
        QueryNode::Bool(BoolQuery {
            must: vec![self.all_searchable_text()],
            should: self.should_groups(),
            ..Default::default()
        })
    }

    fn matching(&self, field: String, options: MatchOptions) -> QueryNode {
        QueryNode::text_match(field, self.term, options)
    }

    fn all_searchable_text(&self) -> QueryNode {
        let default = || MatchOptions::default().minimum_should_match(MINIMUM_SHOULD_MATCH);
        let mut queries = vec![self.matching(ALL_SEARCHABLE_TEXT.to_string(), default())];
        if self.synonyms {
            queries.push(self.matching(format!("{ALL_SEARCHABLE_TEXT}.synonym"), default()));
        }
        queries.push(self.matching(
            format!("{ALL_SEARCHABLE_TEXT}.id_codes"),
            MatchOptions::default().minimum_should_match("1"),
        ));
        QueryNode::dis_max(queries, MUST_TIE_BREAKER)
    }

    fn should_groups(&self) -> Vec<QueryNode> {
        let words = |suffix: &str, msm: &str| -> QueryNode {
            group(|field, boost| {
                self.matching(
                    format!("{field}.{suffix}"),
                    MatchOptions::boosted(boost).minimum_should_match(msm),
                )
            })
        };

        let mut groups = vec![
            words("no_stop", MINIMUM_SHOULD_MATCH),
            self.phrase_group(),
            group(|field, boost| {
                self.matching(
                    format!("{field}.no_stop"),
                    MatchOptions::boosted(boost)
                        .minimum_should_match(MINIMUM_SHOULD_MATCH)
                        .require_all(),
                )
            }),
        ];
        if self.synonyms {
            groups.push(words("synonym", MINIMUM_SHOULD_MATCH));
        }
        groups.push(words("shingles", MINIMUM_SHOULD_MATCH));
        groups.push(words("id_codes", "1"));
        groups
    }

    fn phrase_group(&self) -> QueryNode {
        group(|field, boost| QueryNode::phrase(format!("{field}.no_stop"), self.term, boost))
    }
}

fn group(mut query: impl FnMut(&str, f64) -> QueryNode) -> QueryNode {
    let queries = MATCH_FIELDS
        .iter()
        .map(|(field, boost)| query(field, *boost))
        .collect();
    QueryNode::dis_max(queries, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query_builder::{FieldOperator, FieldQuery};

    #[test]
    fn test_quoted_phrase_is_single_dis_max() {
        match TextQuery::new("tax credits", true).build() {
            QueryNode::DisMax(d) => {
                assert_eq!(d.queries.len(), 4);
                assert!(d.queries.iter().all(|q| matches!(
                    q,
                    QueryNode::Field(FieldQuery { operator: FieldOperator::Phrase { .. }, .. })
                )));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unquoted_structure() {
        match TextQuery::new("tax credits", false).build() {
            QueryNode::Bool(b) => {
                assert_eq!(b.must.len(), 1);
                assert_eq!(b.should.len(), 6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_disabling_synonyms_drops_synonym_clauses() {
        match TextQuery::new("tax", false).without_synonyms().build() {
            QueryNode::Bool(b) => {
                assert_eq!(b.should.len(), 5);
                match &b.must[0] {
                    QueryNode::DisMax(d) => assert_eq!(d.queries.len(), 2),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
