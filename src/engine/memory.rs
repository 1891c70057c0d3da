// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory search engine.
//!
//! Evaluates the query AST directly over stored JSON documents, with the
//! same clause semantics the HTTP engine gets from Elasticsearch:
//!
//! ```text
//! term / terms / exists / range    exact tests on stored values
//! match                            analysed terms vs minimum_should_match
//! match_phrase                     positional match
//! dis_max                          max + tie_breaker × rest
//! bool                             must / filter / should / must_not
//! constant_score / function_score  fixed / multiplied scores
//! more_like_this                   shared frequent terms
//! ```
//!
//! Analysed sub-fields (`title.no_stop`, `.synonym`) read their base field.
//! `.shingles` matches adjacent word pairs and `.id_codes` only tokens that
//! contain a digit. Unknown indexes are empty.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::traits::{
    AggregationResult, Bucket, EngineError, EngineHealth, RawHit, RawSearchResponse, SearchEngine,
};
use crate::analysis::{self, MinimumShouldMatch, Token};
use crate::params::{parse_date_bound, SortDirection};
use crate::search::{
    AggregationKind, BoolQuery, FieldOperator, FieldQuery, HighlightField, HighlightRequest,
    MatchOptions, MoreLikeThisQuery, QueryNode, QueryValue, ScoreFunction, SearchRequest,
    SortClause,
};

/// Fields combined into `all_searchable_text`.
const SEARCHABLE_TEXT_FIELDS: &[&str] = &["title", "acronym", "description", "indexable_content"];

/// Terms taken from the source documents of a more-like-this query.
const MORE_LIKE_THIS_TERMS: usize = 25;

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    doc_type: String,
    source: Map<String, Value>,
}

type Corpus = BTreeMap<String, Vec<StoredDocument>>;

pub struct InMemoryEngine {
    indexes: RwLock<Corpus>,
    searches: AtomicU64,
}

impl InMemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(BTreeMap::new()),
            searches: AtomicU64::new(0),
        }
    }

    /// Store a document, replacing any with the same id in that index.
    pub fn add_document(&self, index: &str, doc_type: &str, id: &str, source: Value) {
        let Value::Object(source) = source else {
            warn!(index, id, "ignoring non-object document");
            return;
        };
        let mut indexes = self.indexes.write();
        let docs = indexes.entry(index.to_string()).or_default();
        docs.retain(|d| d.id != id);
        docs.push(StoredDocument {
            id: id.to_string(),
            doc_type: doc_type.to_string(),
            source,
        });
    }

    pub fn delete_document(&self, index: &str, id: &str) -> bool {
        let mut indexes = self.indexes.write();
        let Some(docs) = indexes.get_mut(index) else {
            return false;
        };
        let before = docs.len();
        docs.retain(|d| d.id != id);
        docs.len() != before
    }

    /// Create an empty index if it does not exist.
    pub fn create_index(&self, index: &str) {
        self.indexes.write().entry(index.to_string()).or_default();
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.read().contains_key(index)
    }

    #[must_use]
    pub fn document_count(&self, index: &str) -> usize {
        self.indexes.read().get(index).map_or(0, Vec::len)
    }

    /// Number of `search` calls served.
    #[must_use]
    pub fn search_count(&self) -> u64 {
        self.searches.load(AtomicOrdering::Relaxed)
    }

    /// Clear all documents
    pub fn clear(&self) {
        self.indexes.write().clear();
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for InMemoryEngine {
    async fn search(
        &self,
        indexes: &[String],
        request: &SearchRequest,
    ) -> Result<RawSearchResponse, EngineError> {
        self.searches.fetch_add(1, AtomicOrdering::Relaxed);
        let corpus = self.indexes.read();
        let evaluator = Evaluator { corpus: &corpus };

        let mut matched: Vec<(&str, &StoredDocument, f64)> = Vec::new();
        for index in indexes {
            let Some(docs) = corpus.get(index) else {
                continue;
            };
            for doc in docs {
                if let Some(score) = evaluator.score(&request.query.root, doc) {
                    matched.push((index.as_str(), doc, score));
                }
            }
        }

        let mut aggregations = BTreeMap::new();
        for aggregation in &request.aggregations {
            let scoped = matched.iter().filter(|(_, doc, _)| {
                aggregation
                    .filter
                    .as_ref()
                    .map_or(true, |f| evaluator.score(&f.root, doc).is_some())
            });
            let result = match &aggregation.kind {
                AggregationKind::Terms { field, size } => terms_aggregation(scoped, field, *size),
                AggregationKind::Missing { field } => AggregationResult::Missing {
                    doc_count: scoped.filter(|(_, doc, _)| !has_value(doc, field)).count() as u64,
                },
            };
            aggregations.insert(aggregation.name.clone(), result);
        }

        if let Some(filter) = &request.post_filter {
            matched.retain(|(_, doc, _)| evaluator.score(&filter.root, doc).is_some());
        }
        let total = matched.len() as u64;

        if request.sort.is_empty() {
            matched.sort_by(|a, b| b.2.total_cmp(&a.2));
        } else {
            matched.sort_by(|a, b| compare_by_fields(&request.sort, a.1, b.1));
        }

        let highlight_terms = request
            .highlight
            .as_ref()
            .map(|_| query_terms(&request.query.root))
            .unwrap_or_default();

        let hits = matched
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|(index, doc, score)| RawHit {
                index: index.to_string(),
                doc_type: doc.doc_type.clone(),
                id: doc.id.clone(),
                score: request.sort.is_empty().then_some(score),
                source: project(&doc.source, &request.source_fields),
                highlight: request
                    .highlight
                    .as_ref()
                    .map(|h| highlight_document(doc, h, &highlight_terms))
                    .unwrap_or_default(),
                explanation: request.explain.then(|| {
                    json!({
                        "value": score,
                        "description": "sum of matching clause scores",
                        "details": [],
                    })
                }),
            })
            .collect::<Vec<_>>();

        debug!(indexes = ?indexes, total, returned = hits.len(), "in-memory search");
        Ok(RawSearchResponse {
            total,
            hits,
            aggregations,
        })
    }

    async fn health(&self) -> Result<EngineHealth, EngineError> {
        Ok(EngineHealth {
            status: "green".into(),
            detail: Some(format!("{} in-memory indexes", self.indexes.read().len())),
        })
    }
}

struct Evaluator<'a> {
    corpus: &'a Corpus,
}

impl Evaluator<'_> {
    /// `None` when the document does not match, else its score.
    fn score(&self, node: &QueryNode, doc: &StoredDocument) -> Option<f64> {
        match node {
            QueryNode::MatchAll => Some(1.0),
            QueryNode::Field(field) => field_score(field, doc),
            QueryNode::And(nodes) => nodes
                .iter()
                .map(|n| self.score(n, doc))
                .sum::<Option<f64>>(),
            QueryNode::Or(nodes) => {
                let scores: Vec<f64> = nodes.iter().filter_map(|n| self.score(n, doc)).collect();
                (!scores.is_empty()).then(|| scores.iter().sum())
            }
            QueryNode::Not(inner) => self.score(inner, doc).is_none().then_some(0.0),
            QueryNode::Bool(query) => self.bool_score(query, doc),
            QueryNode::DisMax(dis_max) => {
                let scores: Vec<f64> = dis_max
                    .queries
                    .iter()
                    .filter_map(|n| self.score(n, doc))
                    .collect();
                let best = scores.iter().copied().reduce(f64::max)?;
                let rest: f64 = scores.iter().sum::<f64>() - best;
                Some(best + dis_max.tie_breaker * rest)
            }
            QueryNode::ConstantScore { filter, boost } => {
                self.score(filter, doc).map(|_| *boost)
            }
            QueryNode::FunctionScore(function_score) => {
                let score = self.score(&function_score.query, doc)?;
                let multiplier: f64 = function_score
                    .functions
                    .iter()
                    .filter_map(|function| match function {
                        ScoreFunction::Weight { filter, weight } => {
                            self.score(filter, doc).map(|_| *weight)
                        }
                        ScoreFunction::FieldValueFactor { field, missing } => {
                            let value = numeric_value(doc, field).unwrap_or(*missing);
                            Some((2.0 + value.max(0.0)).log10())
                        }
                    })
                    .product();
                Some(score * multiplier)
            }
            QueryNode::MoreLikeThis(mlt) => self.more_like_this(mlt, doc),
        }
    }

    fn bool_score(&self, query: &BoolQuery, doc: &StoredDocument) -> Option<f64> {
        if query.must_not.iter().any(|n| self.score(n, doc).is_some()) {
            return None;
        }
        if !query.filter.iter().all(|n| self.score(n, doc).is_some()) {
            return None;
        }
        let must: f64 = query
            .must
            .iter()
            .map(|n| self.score(n, doc))
            .sum::<Option<f64>>()?;
        let should: Vec<f64> = query.should.iter().filter_map(|n| self.score(n, doc)).collect();
        if query.must.is_empty() && query.filter.is_empty() && !query.should.is_empty() && should.is_empty() {
            return None;
        }
        Some(must + should.iter().sum::<f64>())
    }

    fn more_like_this(&self, mlt: &MoreLikeThisQuery, doc: &StoredDocument) -> Option<f64> {
        if mlt.like.iter().any(|like| like.id == doc.id) {
            return None;
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for like in &mlt.like {
            let Some(source) = self
                .corpus
                .get(&like.index)
                .and_then(|docs| docs.iter().find(|d| d.id == like.id))
            else {
                continue;
            };
            for term in analysis::terms(&searchable_text(source)) {
                *counts.entry(term).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(MORE_LIKE_THIS_TERMS);
        if ranked.is_empty() {
            return None;
        }

        let doc_terms: HashSet<String> = analysis::terms(&searchable_text(doc)).into_iter().collect();
        let shared = ranked.iter().filter(|(t, _)| doc_terms.contains(t)).count();
        let required = (ranked.len() * 3 / 10).max(1);
        (shared >= required).then_some(shared as f64)
    }
}

fn split_field(field: &str) -> (&str, Option<&str>) {
    match field.split_once('.') {
        Some((base, sub)) => (base, Some(sub)),
        None => (field, None),
    }
}

/// Stored values of a field, arrays flattened. `document_type` falls back
/// to the document's type.
fn keyword_values(doc: &StoredDocument, field: &str) -> Vec<String> {
    let (base, _) = split_field(field);
    let Some(value) = doc.source.get(base) else {
        if base == "document_type" {
            return vec![doc.doc_type.clone()];
        }
        return Vec::new();
    };
    let scalar = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    match value {
        Value::Array(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

fn has_value(doc: &StoredDocument, field: &str) -> bool {
    keyword_values(doc, field).iter().any(|v| !v.is_empty())
}

fn numeric_value(doc: &StoredDocument, field: &str) -> Option<f64> {
    match doc.source.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn text_value(source: &Map<String, Value>, field: &str) -> String {
    match source.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn searchable_text(doc: &StoredDocument) -> String {
    SEARCHABLE_TEXT_FIELDS
        .iter()
        .map(|f| text_value(&doc.source, f))
        .collect::<Vec<_>>()
        .join("\n")
}

fn field_text(doc: &StoredDocument, base: &str) -> String {
    if base == crate::search::ALL_SEARCHABLE_TEXT {
        searchable_text(doc)
    } else {
        text_value(&doc.source, base)
    }
}

/// Tokens as the analysed sub-field would index them.
fn analyze_for(sub: Option<&str>, text: &str) -> Vec<Token> {
    let tokens = analysis::analyze(text);
    match sub {
        Some("id_codes") => tokens
            .into_iter()
            .filter(|t| t.term.bytes().any(|b| b.is_ascii_digit()))
            .collect(),
        Some("shingles") => tokens
            .windows(2)
            .filter(|pair| pair[1].position == pair[0].position + 1)
            .map(|pair| Token {
                term: format!("{} {}", pair[0].term, pair[1].term),
                position: pair[0].position,
                start: pair[0].start,
                end: pair[1].end,
            })
            .collect(),
        _ => tokens,
    }
}

fn field_score(query: &FieldQuery, doc: &StoredDocument) -> Option<f64> {
    let matched = match (&query.operator, &query.value) {
        (FieldOperator::Equals, QueryValue::Text(text)) => {
            keyword_values(doc, &query.field).iter().any(|v| v == text)
        }
        (FieldOperator::Equals, QueryValue::Boolean(b)) => {
            let (base, _) = split_field(&query.field);
            match doc.source.get(base) {
                Some(Value::Bool(value)) => value == b,
                Some(Value::String(value)) => value == &b.to_string(),
                _ => false,
            }
        }
        (FieldOperator::In, QueryValue::Tags(tags)) => keyword_values(doc, &query.field)
            .iter()
            .any(|v| tags.contains(v)),
        (FieldOperator::Exists, _) => has_value(doc, &query.field),
        (FieldOperator::Range, QueryValue::DateRange { from, to }) => {
            keyword_values(doc, &query.field).iter().any(|raw| {
                parse_date_bound(raw, false).is_some_and(|at| in_range(at, *from, *to))
            })
        }
        (FieldOperator::Match(options), QueryValue::Text(text)) => {
            return match_score(doc, &query.field, text, options);
        }
        (FieldOperator::Phrase { boost }, QueryValue::Text(text)) => {
            return phrase_score(doc, &query.field, text, *boost);
        }
        _ => false,
    };
    matched.then_some(1.0)
}

fn in_range(at: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.map_or(true, |f| at >= f) && to.map_or(true, |t| at <= t)
}

fn match_score(doc: &StoredDocument, field: &str, text: &str, options: &MatchOptions) -> Option<f64> {
    let (base, sub) = split_field(field);
    let mut query_terms: Vec<String> = Vec::new();
    for token in analyze_for(sub, text) {
        if !query_terms.contains(&token.term) {
            query_terms.push(token.term);
        }
    }
    if query_terms.is_empty() {
        return None;
    }

    let field_terms: HashSet<String> = analyze_for(sub, &field_text(doc, base))
        .into_iter()
        .map(|t| t.term)
        .collect();
    let matched = query_terms.iter().filter(|t| field_terms.contains(*t)).count();
    let clauses = query_terms.len();
    let required = if options.require_all {
        clauses
    } else {
        options
            .minimum_should_match
            .as_deref()
            .and_then(MinimumShouldMatch::parse)
            .map_or(1, |msm| msm.required(clauses))
    };
    (matched > 0 && matched >= required).then(|| options.boost * matched as f64)
}

fn phrase_score(doc: &StoredDocument, field: &str, text: &str, boost: f64) -> Option<f64> {
    let (base, _) = split_field(field);
    let phrase = analysis::analyze(text);
    let first = phrase.first()?;

    let tokens = analysis::analyze(&field_text(doc, base));
    let at: HashMap<usize, &str> = tokens.iter().map(|t| (t.position, t.term.as_str())).collect();
    let found = tokens.iter().filter(|t| t.term == first.term).any(|start| {
        phrase.iter().all(|q| {
            at.get(&(start.position + q.position - first.position))
                .is_some_and(|term| *term == q.term)
        })
    });
    found.then(|| boost * phrase.len() as f64)
}

fn terms_aggregation<'a>(
    docs: impl Iterator<Item = &'a (&'a str, &'a StoredDocument, f64)>,
    field: &str,
    size: usize,
) -> AggregationResult {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for (_, doc, _) in docs {
        let values: HashSet<String> = keyword_values(doc, field).into_iter().collect();
        for value in values {
            *counts.entry(value).or_default() += 1;
        }
    }
    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(key, doc_count)| Bucket { key, doc_count })
        .collect();
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(size);
    AggregationResult::Terms { buckets }
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum SortValue {
    Number(f64),
    Date(DateTime<Utc>),
    Text(String),
}

fn sort_value(doc: &StoredDocument, field: &str) -> Option<SortValue> {
    let (base, _) = split_field(field);
    match doc.source.get(base)? {
        Value::Number(n) => n.as_f64().map(SortValue::Number),
        Value::String(s) => Some(
            parse_date_bound(s, false)
                .map(SortValue::Date)
                .unwrap_or_else(|| SortValue::Text(s.to_lowercase())),
        ),
        Value::Bool(b) => Some(SortValue::Text(b.to_string())),
        _ => None,
    }
}

/// Compare on each sort clause in turn; documents without a value sort last
/// in either direction.
fn compare_by_fields(sort: &[SortClause], a: &StoredDocument, b: &StoredDocument) -> Ordering {
    for clause in sort {
        let ordering = match (sort_value(a, &clause.field), sort_value(b, &clause.field)) {
            (Some(x), Some(y)) => {
                let natural = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                match clause.direction {
                    SortDirection::Asc => natural,
                    SortDirection::Desc => natural.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(source: &Map<String, Value>, fields: &[String]) -> Map<String, Value> {
    if fields.is_empty() {
        return source.clone();
    }
    fields
        .iter()
        .filter_map(|f| source.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

/// Analysed terms of every text clause in a query.
fn query_terms(node: &QueryNode) -> HashSet<String> {
    let mut terms = HashSet::new();
    collect_terms(node, &mut terms);
    terms
}

fn collect_terms(node: &QueryNode, terms: &mut HashSet<String>) {
    match node {
        QueryNode::Field(FieldQuery {
            operator: FieldOperator::Match(_) | FieldOperator::Phrase { .. },
            value: QueryValue::Text(text),
            ..
        }) => terms.extend(analysis::terms(text)),
        QueryNode::And(nodes) | QueryNode::Or(nodes) => {
            nodes.iter().for_each(|n| collect_terms(n, terms));
        }
        QueryNode::Bool(query) => query
            .must
            .iter()
            .chain(&query.should)
            .chain(&query.filter)
            .for_each(|n| collect_terms(n, terms)),
        QueryNode::DisMax(dis_max) => dis_max.queries.iter().for_each(|n| collect_terms(n, terms)),
        QueryNode::FunctionScore(function_score) => collect_terms(&function_score.query, terms),
        _ => {}
    }
}

fn highlight_document(
    doc: &StoredDocument,
    request: &HighlightRequest,
    terms: &HashSet<String>,
) -> BTreeMap<String, Vec<String>> {
    request
        .fields
        .iter()
        .filter_map(|field| {
            let text = text_value(&doc.source, &field.name);
            highlight_fragment(&text, terms, field, request)
                .map(|fragment| (field.name.clone(), vec![fragment]))
        })
        .collect()
}

/// Fragment of `text` around the first matching word, matches wrapped in
/// the request's tags. `None` when no word matches.
pub(crate) fn highlight_fragment(
    text: &str,
    terms: &HashSet<String>,
    field: &HighlightField,
    request: &HighlightRequest,
) -> Option<String> {
    let matches: Vec<Token> = analysis::analyze(text)
        .into_iter()
        .filter(|t| terms.contains(&t.term))
        .collect();
    let first = matches.first()?;

    let (start, end) = match field.fragment_size {
        Some(size) if field.number_of_fragments > 0 && text.len() > size => {
            fragment_window(text, first.start, first.end, size)
        }
        _ => (0, text.len()),
    };

    let encode = |s: &str| {
        if request.encode_html {
            html_escape(s)
        } else {
            s.to_string()
        }
    };
    let mut out = String::new();
    let mut cursor = start;
    for token in matches.iter().filter(|t| t.start >= start && t.end <= end) {
        out.push_str(&encode(&text[cursor..token.start]));
        out.push_str(&request.pre_tag);
        out.push_str(&encode(&text[token.start..token.end]));
        out.push_str(&request.post_tag);
        cursor = token.end;
    }
    out.push_str(&encode(&text[cursor..end]));
    Some(out.trim().to_string())
}

/// Byte window of at most `size` bytes containing `[match_start, match_end)`,
/// snapped to word boundaries.
fn fragment_window(text: &str, match_start: usize, match_end: usize, size: usize) -> (usize, usize) {
    let mut start = match_start.saturating_sub(size / 2);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    if start > 0 {
        start = text[start..match_start]
            .find(char::is_whitespace)
            .map_or(match_start, |i| start + i + 1);
    }
    let mut end = (start + size).min(text.len()).max(match_end);
    while !text.is_char_boundary(end) {
        end += 1;
    }
    if end < text.len() {
        end = text[match_end..end]
            .rfind(char::is_whitespace)
            .map_or(end, |i| match_end + i);
    }
    (start, end)
}

/// Escape text for HTML the way the engine's html encoder does.
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
