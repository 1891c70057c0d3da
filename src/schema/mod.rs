// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field schema and allow-lists.
//!
//! The schema decides which parameters a client may use: which fields can be
//! filtered (and how), sorted, aggregated, fetched as aggregate examples and
//! returned. Parsers never consult field names directly; they ask the schema.
//!
//! # Example
//!
//! ```rust
//! use search_gateway::schema::{FilterKind, SearchSchema};
//!
//! let schema = SearchSchema::government();
//! schema.validate().unwrap();
//!
//! assert_eq!(schema.filter_kind("organisations"), Some(FilterKind::Text));
//! assert_eq!(schema.filter_kind("public_timestamp"), Some(FilterKind::Date));
//! assert_eq!(schema.sort_field("title"), Some("title.sort"));
//! assert!(schema.is_return_field("title_with_highlighting"));
//! ```
//!
//! # Design
//!
//! - **Built-in tables**: `government()` for the general endpoint,
//!   `specialist()` adds specialist-finder fields and multi-value filters
//! - **Validated once**: [`SearchSchema::validate`] runs at startup so a bad
//!   table fails the process rather than a request

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Fields computed by the presenter rather than stored in documents.
pub const VIRTUAL_FIELDS: &[&str] = &[
    "title_with_highlighting",
    "description_with_highlighting",
    "expanded_topics",
    "expanded_organisations",
];

/// Sentinel filter value matching documents without the field.
pub const MISSING_FIELD_VALUE: &str = "_MISSING";

/// Stored type of a document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Single exact-match keyword
    Identifier,
    /// List of exact-match keywords
    Identifiers,
    /// Analysed free text
    SearchableText,
    /// Stored, unindexed text
    Text,
    /// ISO8601 date or datetime
    Date,
    /// `true` / `false`
    Boolean,
    /// Numeric value
    Number,
    /// Nested object, returned as-is
    Object,
}

impl FieldType {
    /// Which filter a `filter_<field>` parameter builds for this type.
    pub fn filter_kind(self) -> Option<FilterKind> {
        match self {
            Self::Identifier | Self::Identifiers => Some(FilterKind::Text),
            Self::Date => Some(FilterKind::Date),
            Self::Boolean => Some(FilterKind::Boolean),
            _ => None,
        }
    }
}

/// Kind of filter a field supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Date,
    Boolean,
}

/// One field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("allow-list '{list}' names undefined field '{field}'")]
    UndefinedField { list: &'static str, field: String },
    #[error("field '{field}' in allow-list '{list}' has unsuitable type {field_type:?}")]
    UnsuitableType {
        list: &'static str,
        field: String,
        field_type: FieldType,
    },
}

/// Field schema with allow-lists for one search surface.
#[derive(Debug, Clone)]
pub struct SearchSchema {
    fields: BTreeMap<String, FieldDefinition>,
    sort_fields: BTreeMap<String, String>,
    aggregate_fields: BTreeSet<String>,
    example_fields: BTreeSet<String>,
    default_return_fields: Vec<String>,
    filter_aliases: BTreeMap<String, String>,
    multivalue_filters: bool,
}

const IDENTIFIER_FIELDS: &[&str] = &[
    "content_id",
    "content_store_document_type",
    "content_purpose_document_supertype",
    "content_purpose_subgroup",
    "content_purpose_supergroup",
    "detailed_format",
    "display_type",
    "document_type",
    "email_document_supertype",
    "format",
    "government_document_supertype",
    "link",
    "manual",
    "navigation_document_supertype",
    "organisation_state",
    "organisation_type",
    "primary_publishing_organisation",
    "publishing_app",
    "rendering_app",
    "search_user_need_document_supertype",
    "slug",
    "user_journey_document_supertype",
];

const MULTI_IDENTIFIER_FIELDS: &[&str] = &[
    "document_collections",
    "document_series",
    "mainstream_browse_page_content_ids",
    "mainstream_browse_pages",
    "organisation_content_ids",
    "organisations",
    "part_of_taxonomy_tree",
    "people",
    "policies",
    "policy_areas",
    "roles",
    "search_format_types",
    "specialist_sectors",
    "taxons",
    "topic_content_ids",
    "topical_events",
    "world_locations",
];

const SEARCHABLE_FIELDS: &[&str] = &["acronym", "description", "indexable_content", "title"];

const DATE_FIELDS: &[&str] = &[
    "assessment_date",
    "closing_date",
    "first_published_at",
    "public_timestamp",
    "release_timestamp",
    "start_date",
    "updated_at",
];

const BOOLEAN_FIELDS: &[&str] = &["has_official_document", "is_historic", "is_withdrawn"];

const SPECIALIST_IDENTIFIER_FIELDS: &[&str] = &[
    "case_state",
    "case_type",
    "market_sector",
    "outcome_type",
    "tribunal_decision_categories",
];

const SPECIALIST_DATE_FIELDS: &[&str] =
    &["closed_date", "opened_date", "tribunal_decision_decision_date"];

const SORT_FIELDS: &[(&str, &str)] = &[
    ("assessment_date", "assessment_date"),
    ("closing_date", "closing_date"),
    ("popularity", "popularity"),
    ("public_timestamp", "public_timestamp"),
    ("release_timestamp", "release_timestamp"),
    ("start_date", "start_date"),
    ("title", "title.sort"),
];

const SPECIALIST_SORT_FIELDS: &[(&str, &str)] =
    &[("tribunal_decision_decision_date", "tribunal_decision_decision_date")];

fn sort_pairs<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Iterator<Item = (String, String)> + 'a {
    pairs
        .iter()
        .map(|(param, field)| ((*param).to_string(), (*field).to_string()))
}

const AGGREGATE_FIELDS: &[&str] = &[
    "content_purpose_document_supertype",
    "content_purpose_subgroup",
    "content_purpose_supergroup",
    "content_store_document_type",
    "detailed_format",
    "document_collections",
    "document_series",
    "email_document_supertype",
    "format",
    "government_document_supertype",
    "mainstream_browse_pages",
    "manual",
    "navigation_document_supertype",
    "organisation_type",
    "organisations",
    "part_of_taxonomy_tree",
    "people",
    "policies",
    "policy_areas",
    "primary_publishing_organisation",
    "publishing_app",
    "rendering_app",
    "roles",
    "search_format_types",
    "search_user_need_document_supertype",
    "specialist_sectors",
    "taxons",
    "topical_events",
    "user_journey_document_supertype",
    "world_locations",
];

const AGGREGATE_EXAMPLE_FIELDS: &[&str] = &[
    "content_purpose_subgroup",
    "content_purpose_supergroup",
    "content_store_document_type",
    "email_document_supertype",
    "format",
    "government_document_supertype",
    "mainstream_browse_pages",
    "manual",
    "navigation_document_supertype",
    "organisations",
    "part_of_taxonomy_tree",
    "publishing_app",
    "rendering_app",
    "specialist_sectors",
    "taxons",
    "topical_events",
];

const DEFAULT_RETURN_FIELDS: &[&str] = &[
    "description",
    "display_type",
    "document_series",
    "format",
    "link",
    "organisations",
    "public_timestamp",
    "slug",
    "specialist_sectors",
    "title",
    "policy_areas",
    "world_locations",
    "topic_content_ids",
    "topical_events",
    "expanded_topics",
    "organisation_content_ids",
    "expanded_organisations",
];

fn strings<'a>(names: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    names.iter().map(|s| (*s).to_string())
}

impl SearchSchema {
    /// Empty schema; use the builder methods or a built-in table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            sort_fields: BTreeMap::new(),
            aggregate_fields: BTreeSet::new(),
            example_fields: BTreeSet::new(),
            default_return_fields: Vec::new(),
            filter_aliases: BTreeMap::new(),
            multivalue_filters: false,
        }
    }

    /// Schema for the general search endpoint.
    #[must_use]
    pub fn government() -> Self {
        let mut schema = Self::new()
            .with_fields(IDENTIFIER_FIELDS, FieldType::Identifier)
            .with_fields(MULTI_IDENTIFIER_FIELDS, FieldType::Identifiers)
            .with_fields(SEARCHABLE_FIELDS, FieldType::SearchableText)
            .with_fields(DATE_FIELDS, FieldType::Date)
            .with_fields(BOOLEAN_FIELDS, FieldType::Boolean)
            .with_fields(&["popularity"], FieldType::Number)
            .with_fields(&["organisation_closed_state", "logo_formatted_title"], FieldType::Text)
            .with_fields(&["details"], FieldType::Object);

        schema.sort_fields = sort_pairs(SORT_FIELDS).collect();
        schema.aggregate_fields = strings(AGGREGATE_FIELDS).collect();
        schema.example_fields = strings(AGGREGATE_EXAMPLE_FIELDS).collect();
        schema.default_return_fields = strings(DEFAULT_RETURN_FIELDS).collect();
        schema
            .filter_aliases
            .insert("elasticsearch_type".into(), "document_type".into());
        schema
    }

    /// Schema for the specialist-documents endpoint.
    ///
    /// Adds specialist-finder fields and enables the `filter_all_`/
    /// `filter_any_`/`reject_all_`/`reject_any_` parameter forms.
    #[must_use]
    pub fn specialist() -> Self {
        let mut schema = Self::government()
            .with_fields(SPECIALIST_IDENTIFIER_FIELDS, FieldType::Identifiers)
            .with_fields(SPECIALIST_DATE_FIELDS, FieldType::Date);
        schema
            .aggregate_fields
            .extend(strings(SPECIALIST_IDENTIFIER_FIELDS));
        schema.sort_fields.extend(sort_pairs(SPECIALIST_SORT_FIELDS));
        schema.multivalue_filters = true;
        schema
    }

    /// Add fields of one type.
    #[must_use]
    pub fn with_fields(mut self, names: &[&str], field_type: FieldType) -> Self {
        for name in names {
            self.fields.insert(
                (*name).to_string(),
                FieldDefinition {
                    name: (*name).to_string(),
                    field_type,
                },
            );
        }
        self
    }

    /// Check every allow-list against the field table.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (param, field) in &self.sort_fields {
            let base = field.strip_suffix(".sort").unwrap_or(field);
            let def = self.require("sort_fields", base)?;
            if !matches!(
                def.field_type,
                FieldType::Date | FieldType::Number | FieldType::SearchableText | FieldType::Identifier
            ) {
                return Err(SchemaError::UnsuitableType {
                    list: "sort_fields",
                    field: param.clone(),
                    field_type: def.field_type,
                });
            }
        }

        for field in &self.aggregate_fields {
            let def = self.require("aggregate_fields", field)?;
            if def.field_type.filter_kind() != Some(FilterKind::Text) {
                return Err(SchemaError::UnsuitableType {
                    list: "aggregate_fields",
                    field: field.clone(),
                    field_type: def.field_type,
                });
            }
        }

        for field in &self.example_fields {
            if !self.aggregate_fields.contains(field) {
                return Err(SchemaError::UndefinedField {
                    list: "example_fields",
                    field: field.clone(),
                });
            }
        }

        for field in &self.default_return_fields {
            if !self.is_return_field(field) {
                return Err(SchemaError::UndefinedField {
                    list: "default_return_fields",
                    field: field.clone(),
                });
            }
        }

        for target in self.filter_aliases.values() {
            let def = self.require("filter_aliases", target)?;
            if def.field_type.filter_kind().is_none() {
                return Err(SchemaError::UnsuitableType {
                    list: "filter_aliases",
                    field: target.clone(),
                    field_type: def.field_type,
                });
            }
        }
        Ok(())
    }

    fn require(&self, list: &'static str, field: &str) -> Result<&FieldDefinition, SchemaError> {
        self.fields
            .get(field)
            .ok_or_else(|| SchemaError::UndefinedField {
                list,
                field: field.to_string(),
            })
    }

    /// Field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// All defined field names.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Resolve filter aliases (`elasticsearch_type` → `document_type`).
    pub fn resolve_filter_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.filter_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Filter kind for a (possibly aliased) field, `None` if not filterable.
    pub fn filter_kind(&self, name: &str) -> Option<FilterKind> {
        self.fields
            .get(self.resolve_filter_name(name))
            .and_then(|def| def.field_type.filter_kind())
    }

    /// Engine sort field for a sortable parameter value.
    pub fn sort_field(&self, name: &str) -> Option<&str> {
        self.sort_fields.get(name).map(String::as_str)
    }

    pub fn is_aggregatable(&self, name: &str) -> bool {
        self.aggregate_fields.contains(name)
    }

    pub fn supports_examples(&self, name: &str) -> bool {
        self.example_fields.contains(name)
    }

    /// Stored or virtual field a client may ask for.
    pub fn is_return_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || VIRTUAL_FIELDS.contains(&name)
    }

    /// Whether stored values of `name` are lists. Unknown fields are not.
    pub fn is_multivalued(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .is_some_and(|def| def.field_type == FieldType::Identifiers)
    }

    pub fn default_return_fields(&self) -> &[String] {
        &self.default_return_fields
    }

    /// Whether `filter_all_` / `filter_any_` style parameters are accepted.
    pub fn multivalue_filters(&self) -> bool {
        self.multivalue_filters
    }
}

impl Default for SearchSchema {
    fn default() -> Self {
        Self::government()
    }
}
