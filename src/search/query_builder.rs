// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Builder - AST for search queries
//!
//! Provides a type-safe way to build search queries that can be translated
//! to Elasticsearch JSON or evaluated directly by the in-memory engine.
//!
//! # Example
//!
//! ```rust
//! use search_gateway::search::{Query, QueryBuilder};
//!
//! // Simple field query
//! let query = Query::term("format", "guide");
//!
//! // Filter-style query with builder
//! let query = QueryBuilder::new()
//!     .term("format", "guide")
//!     .terms("organisations", vec!["hm-revenue-customs".into()])
//!     .build_and();
//!
//! // Boolean combinations
//! let query = Query::term("format", "guide")
//!     .or(Query::term("format", "answer"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search query AST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Root query node
    pub root: QueryNode,
}

impl Query {
    /// Create a new query from a root node
    pub fn new(root: QueryNode) -> Self {
        Self { root }
    }

    /// Query matching every document
    pub fn match_all() -> Self {
        Self::new(QueryNode::MatchAll)
    }

    /// Exact keyword match: `{"term": {field: value}}`
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(QueryNode::term(field, value))
    }

    /// Keyword membership: `{"terms": {field: [values]}}`
    pub fn terms(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(QueryNode::terms(field, values))
    }

    /// Field presence
    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(QueryNode::exists(field))
    }

    /// Date range, either bound optional
    pub fn date_range(
        field: impl Into<String>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new(QueryNode::Field(FieldQuery {
            field: field.into(),
            operator: FieldOperator::Range,
            value: QueryValue::DateRange { from, to },
        }))
    }

    /// Analysed full-text match
    pub fn text_match(field: impl Into<String>, text: impl Into<String>, options: MatchOptions) -> Self {
        Self::new(QueryNode::text_match(field, text, options))
    }

    /// Combine with AND
    pub fn and(self, other: Query) -> Self {
        Self::new(QueryNode::And(vec![self.root, other.root]))
    }

    /// Combine with OR
    pub fn or(self, other: Query) -> Self {
        Self::new(QueryNode::Or(vec![self.root, other.root]))
    }

    /// Negate query
    pub fn negate(self) -> Self {
        Self::new(QueryNode::Not(Box::new(self.root)))
    }
}

/// Query AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    /// Every document, score 1
    MatchAll,
    /// Field query
    Field(FieldQuery),
    /// All children match (filter semantics)
    And(Vec<QueryNode>),
    /// Any child matches (filter semantics)
    Or(Vec<QueryNode>),
    /// Child does not match
    Not(Box<QueryNode>),
    /// Scored boolean combination
    Bool(BoolQuery),
    /// Best child score plus `tie_breaker` times the others
    DisMax(DisMaxQuery),
    /// Fixed score for every document matching `filter`
    ConstantScore { filter: Box<QueryNode>, boost: f64 },
    /// Child score multiplied by score functions
    FunctionScore(FunctionScoreQuery),
    /// Documents similar to the given ones
    MoreLikeThis(MoreLikeThisQuery),
}

impl QueryNode {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Field(FieldQuery {
            field: field.into(),
            operator: FieldOperator::Equals,
            value: QueryValue::Text(value.into()),
        })
    }

    pub fn terms(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::Field(FieldQuery {
            field: field.into(),
            operator: FieldOperator::In,
            value: QueryValue::Tags(values),
        })
    }

    pub fn boolean(field: impl Into<String>, value: bool) -> Self {
        Self::Field(FieldQuery {
            field: field.into(),
            operator: FieldOperator::Equals,
            value: QueryValue::Boolean(value),
        })
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Field(FieldQuery {
            field: field.into(),
            operator: FieldOperator::Exists,
            value: QueryValue::Empty,
        })
    }

    pub fn text_match(field: impl Into<String>, text: impl Into<String>, options: MatchOptions) -> Self {
        Self::Field(FieldQuery {
            field: field.into(),
            operator: FieldOperator::Match(options),
            value: QueryValue::Text(text.into()),
        })
    }

    pub fn phrase(field: impl Into<String>, text: impl Into<String>, boost: f64) -> Self {
        Self::Field(FieldQuery {
            field: field.into(),
            operator: FieldOperator::Phrase { boost },
            value: QueryValue::Text(text.into()),
        })
    }

    /// Dis-max over `queries`; a single query is returned unwrapped.
    pub fn dis_max(mut queries: Vec<QueryNode>, tie_breaker: f64) -> Self {
        if queries.len() == 1 {
            if let Some(only) = queries.pop() {
                return only;
            }
        }
        Self::DisMax(DisMaxQuery {
            queries,
            tie_breaker,
        })
    }
}

/// Scored boolean query with Elasticsearch clause semantics.
///
/// With no `must` or `filter` clauses at least one `should` clause has to
/// match; otherwise `should` clauses only add to the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<QueryNode>,
    pub should: Vec<QueryNode>,
    pub filter: Vec<QueryNode>,
    pub must_not: Vec<QueryNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisMaxQuery {
    pub queries: Vec<QueryNode>,
    pub tie_breaker: f64,
}

/// Child query whose score is multiplied by every applicable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionScoreQuery {
    pub query: Box<QueryNode>,
    pub functions: Vec<ScoreFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoreFunction {
    /// Multiply by `weight` when the document matches `filter`
    Weight { filter: QueryNode, weight: f64 },
    /// Multiply by `log10(2 + value)` of a numeric field (`log2p` modifier)
    FieldValueFactor { field: String, missing: f64 },
}

/// One document a more-like-this query starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeDocument {
    pub index: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoreLikeThisQuery {
    pub like: Vec<LikeDocument>,
}

/// Field query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldQuery {
    /// Field name, optionally with an analysed sub-field (`title.no_stop`)
    pub field: String,
    /// Comparison operator
    pub operator: FieldOperator,
    /// Query value
    pub value: QueryValue,
}

/// Field comparison operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldOperator {
    /// Exact keyword or boolean match
    Equals,
    /// Keyword membership (any of the tags)
    In,
    /// Field is present and non-empty
    Exists,
    /// Date range
    Range,
    /// Analysed full-text match
    Match(MatchOptions),
    /// Analysed phrase match
    Phrase { boost: f64 },
}

/// Options of an analysed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub boost: f64,
    /// Every query term must match (`operator: and`)
    pub require_all: bool,
    pub minimum_should_match: Option<String>,
}

impl MatchOptions {
    pub fn boosted(boost: f64) -> Self {
        Self {
            boost,
            ..Self::default()
        }
    }

    pub fn minimum_should_match(mut self, expr: impl Into<String>) -> Self {
        self.minimum_should_match = Some(expr.into());
        self
    }

    pub fn require_all(mut self) -> Self {
        self.require_all = true;
        self
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            boost: 1.0,
            require_all: false,
            minimum_should_match: None,
        }
    }
}

/// Query value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    /// Text value
    Text(String),
    /// Tag values (OR semantics)
    Tags(Vec<String>),
    /// Boolean value
    Boolean(bool),
    /// Date range, bounds inclusive
    DateRange {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    /// No value (exists)
    Empty,
}

/// Builder for filter-style queries
#[derive(Default)]
pub struct QueryBuilder {
    nodes: Vec<QueryNode>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a keyword equals constraint
    pub fn term(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.nodes.push(QueryNode::term(field, value));
        self
    }

    /// Add a keyword membership constraint
    pub fn terms(mut self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.nodes.push(QueryNode::terms(field, values));
        self
    }

    /// Add a boolean constraint
    pub fn boolean(mut self, field: impl Into<String>, value: bool) -> Self {
        self.nodes.push(QueryNode::boolean(field, value));
        self
    }

    /// Add a date range constraint
    pub fn date_range(
        mut self,
        field: impl Into<String>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.nodes.push(Query::date_range(field, from, to).root);
        self
    }

    /// Add an arbitrary node
    pub fn node(mut self, node: QueryNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build query with AND semantics (all constraints must match)
    pub fn build_and(self) -> Query {
        Query::new(Self::collapse(self.nodes, QueryNode::And))
    }

    /// Build query with OR semantics (any constraint can match)
    pub fn build_or(self) -> Query {
        Query::new(Self::collapse(self.nodes, QueryNode::Or))
    }

    fn collapse(mut nodes: Vec<QueryNode>, combine: fn(Vec<QueryNode>) -> QueryNode) -> QueryNode {
        match nodes.len() {
            // Empty query matches everything
            0 => QueryNode::MatchAll,
            1 => nodes.pop().unwrap_or(QueryNode::MatchAll),
            _ => combine(nodes),
        }
    }
}
