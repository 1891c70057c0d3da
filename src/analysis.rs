// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Text analysis shared by the in-memory engine, best-bet matching and the
//! spelling suggester.
//!
//! Pipeline: UAX#29 word boundaries → strip possessives → keep alphanumerics
//!           → lowercase → drop stopwords → light English stem
//!
//! Tokens keep their byte offsets into the source text so highlighting can
//! wrap the original words rather than their stems.

use unicode_segmentation::UnicodeSegmentation;

/// English stopwords (Lucene's default set).
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

#[inline]
fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

#[inline]
fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("\u{2019}s"))
        .unwrap_or(word)
}

/// A single analysed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Stemmed, lowercased term
    pub term: String,
    /// Ordinal position among the words of the source (stopwords included)
    pub position: usize,
    /// Byte offset of the word start in the source text
    pub start: usize,
    /// Byte offset one past the word end
    pub end: usize,
}

/// Analyse text into positioned tokens.
///
/// Stopwords are dropped but still consume a position, so phrase matching
/// over "state of emergency" requires `state` and `emergency` to be two
/// positions apart, as a positional index would.
pub fn analyze(text: &str) -> Vec<Token> {
    text.unicode_word_indices()
        .enumerate()
        .filter_map(|(position, (start, word))| {
            let cleaned: String = strip_possessive(word)
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if cleaned.is_empty() || is_stopword(&cleaned) {
                return None;
            }
            Some(Token {
                term: stem(&cleaned),
                position,
                start,
                end: start + word.len(),
            })
        })
        .collect()
}

/// Analysed terms only.
pub fn terms(text: &str) -> Vec<String> {
    analyze(text).into_iter().map(|t| t.term).collect()
}

/// Lowercased words without stemming or stopword removal.
///
/// Used where the exact spelling matters (spelling suggestions, best-bet
/// exact keys).
pub fn words(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Normalise a query for exact comparison: lowercase, single spaces.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn contains_vowel(s: &str) -> bool {
    s.chars().any(is_vowel)
}

fn undouble(mut s: String) -> String {
    let bytes = s.as_bytes();
    let n = bytes.len();
    if n >= 2 && bytes[n - 1] == bytes[n - 2] && !matches!(bytes[n - 1], b'l' | b's' | b'z') {
        s.pop();
    }
    s
}

/// Light English stemmer.
///
/// Handles plural and verbal inflections (`-s`, `-es`, `-ies`, `-ing`,
/// `-ed`). Short words and words with non-ASCII letters pass through.
pub fn stem(word: &str) -> String {
    if word.chars().count() <= 3 || !word.is_ascii() {
        return word.to_string();
    }

    if let Some(base) = word.strip_suffix("ies") {
        return format!("{base}y");
    }
    if let Some(base) = word.strip_suffix("sses") {
        return format!("{base}ss");
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    if let Some(base) = word.strip_suffix("ing") {
        if base.len() >= 3 && contains_vowel(base) {
            return undouble(base.to_string());
        }
        return word.to_string();
    }
    if let Some(base) = word.strip_suffix("ed") {
        if base.len() >= 3 && contains_vowel(base) {
            return undouble(base.to_string());
        }
        return word.to_string();
    }
    if let Some(base) = word.strip_suffix("es") {
        if base.ends_with("ch") || base.ends_with("sh") || base.ends_with('x') {
            return base.to_string();
        }
    }
    if let Some(base) = word.strip_suffix('s') {
        return base.to_string();
    }
    word.to_string()
}

/// Lucene-style `minimum_should_match` expression.
///
/// Supports plain integers and percentages (`"1"`, `"75%"`, `"-1"`) and
/// conditional lists such as `"2<-1 5<-2 7<75%"`, where `N<V` applies `V`
/// when there are more than `N` optional clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumShouldMatch {
    conditions: Vec<(usize, MsmValue)>,
    fallback: Option<MsmValue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MsmValue {
    Count(i64),
    Percent(i64),
}

impl MsmValue {
    fn parse(raw: &str) -> Option<Self> {
        if let Some(pct) = raw.strip_suffix('%') {
            pct.parse().ok().map(MsmValue::Percent)
        } else {
            raw.parse().ok().map(MsmValue::Count)
        }
    }

    fn resolve(self, clauses: usize) -> i64 {
        let n = clauses as i64;
        match self {
            Self::Count(c) if c < 0 => n + c,
            Self::Count(c) => c,
            Self::Percent(p) if p < 0 => n - (n * -p / 100),
            Self::Percent(p) => n * p / 100,
        }
    }
}

impl MinimumShouldMatch {
    /// Parse an expression; `None` when it is malformed.
    pub fn parse(expr: &str) -> Option<Self> {
        let mut conditions = Vec::new();
        let mut fallback = None;
        for part in expr.split_whitespace() {
            match part.split_once('<') {
                Some((threshold, value)) => {
                    conditions.push((threshold.parse().ok()?, MsmValue::parse(value)?));
                }
                None => fallback = Some(MsmValue::parse(part)?),
            }
        }
        if conditions.is_empty() && fallback.is_none() {
            return None;
        }
        conditions.sort_by_key(|(threshold, _)| *threshold);
        Some(Self { conditions, fallback })
    }

    /// Number of the `clauses` optional clauses that must match.
    ///
    /// Always at least one when there are clauses at all.
    pub fn required(&self, clauses: usize) -> usize {
        if clauses == 0 {
            return 0;
        }
        let applicable = self
            .conditions
            .iter()
            .rev()
            .find(|(threshold, _)| clauses > *threshold)
            .map(|(_, value)| *value)
            .or(if self.conditions.is_empty() { self.fallback } else { None });

        match applicable {
            Some(value) => value.resolve(clauses).clamp(1, clauses as i64) as usize,
            None => clauses,
        }
    }
}
