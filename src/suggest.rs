// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Spelling suggestions.
//!
//! [`DictionarySuggester`] replaces each unknown word of a query with the
//! closest dictionary word within an edit distance of two:
//!
//! ```text
//! "aplly for pasport"  →  "apply for passport"
//!                          <mark>apply</mark> for <mark>passport</mark>
//! ```
//!
//! Words in the ignore list are never corrected, blacklisted words are never
//! suggested, and a suggestion equal to the query is dropped.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::search::{HIGHLIGHT_POST_TAG, HIGHLIGHT_PRE_TAG};

const MAX_EDIT_DISTANCE: usize = 2;

#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("failed to read dictionary {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A corrected query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub text: String,
    /// Corrected query with changed words in `<mark>` tags
    pub highlighted: String,
}

/// Entry of `suggested_queries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Suggestion {
    Text(String),
    Highlighted { text: String, highlighted: String },
}

impl Suggestion {
    pub fn from_correction(correction: Correction, with_highlighting: bool) -> Self {
        if with_highlighting {
            Self::Highlighted {
                text: correction.text,
                highlighted: correction.highlighted,
            }
        } else {
            Self::Text(correction.text)
        }
    }
}

pub trait Suggester: Send + Sync {
    fn suggest(&self, query: &str) -> Vec<Correction>;
}

#[derive(Debug, Clone, Default)]
pub struct DictionarySuggester {
    words: BTreeSet<String>,
    ignore: HashSet<String>,
    blacklist: HashSet<String>,
}

impl DictionarySuggester {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            ..Default::default()
        }
    }

    /// Load a word list with one word per line.
    pub fn from_file(path: &Path) -> Result<Self, SuggestError> {
        let contents = fs::read_to_string(path).map_err(|source| SuggestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let suggester = Self::new(contents.lines());
        info!(path = %path.display(), words = suggester.words.len(), "Loaded spelling dictionary");
        Ok(suggester)
    }

    /// Words that are left as typed.
    pub fn with_ignore<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignore
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    /// Words that are never suggested.
    pub fn with_blacklist<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    fn is_known(&self, word: &str) -> bool {
        self.words.contains(word)
            || self.ignore.contains(word)
            || word.chars().any(|c| !c.is_alphabetic())
    }

    fn closest(&self, word: &str) -> Option<&str> {
        self.words
            .iter()
            .filter(|candidate| !self.blacklist.contains(candidate.as_str()))
            .map(|candidate| (strsim::levenshtein(word, candidate), candidate))
            .filter(|(distance, _)| *distance <= MAX_EDIT_DISTANCE)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate.as_str())
    }
}

impl Suggester for DictionarySuggester {
    fn suggest(&self, query: &str) -> Vec<Correction> {
        if self.words.is_empty() {
            return Vec::new();
        }
        let mut text = Vec::new();
        let mut highlighted = Vec::new();
        let mut changed = false;

        for word in query.split_whitespace() {
            let lower = word.to_lowercase();
            let replacement = if self.is_known(&lower) {
                None
            } else {
                self.closest(&lower).filter(|c| *c != lower)
            };
            match replacement {
                Some(corrected) => {
                    changed = true;
                    text.push(corrected.to_string());
                    highlighted.push(format!("{HIGHLIGHT_PRE_TAG}{corrected}{HIGHLIGHT_POST_TAG}"));
                }
                None => {
                    text.push(lower.clone());
                    highlighted.push(lower);
                }
            }
        }

        let text = text.join(" ");
        if !changed || text.eq_ignore_ascii_case(query.trim()) {
            return Vec::new();
        }
        if text.split(' ').any(|w| self.blacklist.contains(w)) {
            return Vec::new();
        }
        vec![Correction {
            text,
            highlighted: highlighted.join(" "),
        }]
    }
}
