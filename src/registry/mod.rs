// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entity registries.
//!
//! Each registry holds every document of one format (organisations, topics,
//! people...) fetched from the registry index and kept in a [`TimedCache`].
//! Requests take a [`RegistrySnapshot`] up front so that one response never
//! mixes two versions of a registry.

mod timed_cache;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::{EngineError, SearchEngine};

pub use timed_cache::{TimedCache, TimedCacheStats};

#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("registry {registry} refresh failed: {source}")]
    Refresh {
        registry: String,
        #[source]
        source: EngineError,
    },
}

const BASIC_FIELDS: &[&str] = &["slug", "content_id", "link", "title"];

const ORGANISATION_FIELDS: &[&str] = &[
    "slug",
    "content_id",
    "link",
    "title",
    "acronym",
    "organisation_type",
    "organisation_closed_state",
    "organisation_state",
    "logo_formatted_title",
    "organisation_brand",
    "organisation_crest",
    "logo_url",
    "closed_at",
    "public_timestamp",
    "analytics_identifier",
    "child_organisations",
    "parent_organisations",
    "superseded_organisations",
    "superseding_organisations",
];

/// Registry name, the document format it holds, and the fields fetched.
pub const REGISTRY_DEFINITIONS: &[(&str, &str, &[&str])] = &[
    ("organisations", "organisation", ORGANISATION_FIELDS),
    ("specialist_sectors", "specialist_sector", BASIC_FIELDS),
    ("policy_areas", "topic", BASIC_FIELDS),
    ("document_series", "document_series", BASIC_FIELDS),
    ("document_collections", "document_collection", BASIC_FIELDS),
    ("world_locations", "world_location", BASIC_FIELDS),
    ("people", "person", BASIC_FIELDS),
    ("roles", "ministerial_role", BASIC_FIELDS),
];

/// Entries of one registry with lookups by slug, content id and link.
#[derive(Debug, Default)]
pub struct RegistryIndex {
    entries: Vec<Map<String, Value>>,
    by_slug: HashMap<String, usize>,
    by_content_id: HashMap<String, usize>,
    by_link: HashMap<String, usize>,
}

impl RegistryIndex {
    pub fn new(entries: Vec<Map<String, Value>>) -> Self {
        let mut index = Self::default();
        for (position, entry) in entries.iter().enumerate() {
            let key = |field: &str, map: &mut HashMap<String, usize>| {
                if let Some(value) = entry.get(field).and_then(first_string) {
                    map.entry(value.to_string()).or_insert(position);
                }
            };
            key("slug", &mut index.by_slug);
            key("content_id", &mut index.by_content_id);
            key("link", &mut index.by_link);
        }
        index.entries = entries;
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_slug(&self, slug: &str) -> Option<&Map<String, Value>> {
        self.by_slug.get(slug).map(|&i| &self.entries[i])
    }

    /// Lookup by content id, falling back to link or slug for records that
    /// predate content ids.
    pub fn by_content_id(&self, content_id: &str) -> Option<&Map<String, Value>> {
        self.by_content_id
            .get(content_id)
            .or_else(|| self.by_link.get(content_id))
            .or_else(|| self.by_slug.get(content_id))
            .map(|&i| &self.entries[i])
    }
}

/// Stored fields are sometimes single-element arrays.
fn first_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

/// One registry over a timed cache.
pub struct Registry {
    name: &'static str,
    format: &'static str,
    fields: Vec<String>,
    index: String,
    engine: Arc<dyn SearchEngine>,
    cache: TimedCache<(), RegistryIndex>,
}

impl Registry {
    pub fn new(
        name: &'static str,
        format: &'static str,
        fields: &[&str],
        index: impl Into<String>,
        engine: Arc<dyn SearchEngine>,
        lifetime: Duration,
    ) -> Self {
        Self {
            name,
            format,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            index: index.into(),
            engine,
            cache: TimedCache::new(lifetime),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current entries, refreshed when the cache has expired.
    pub async fn all(&self) -> Result<Arc<RegistryIndex>, RegistryError> {
        self.cache
            .get_or_refresh(&(), || async {
                let documents = self
                    .engine
                    .documents_by_format(&self.index, self.format, &self.fields)
                    .await;
                crate::metrics::record_registry_refresh(self.name, documents.is_ok());
                let documents = documents.map_err(|source| RegistryError::Refresh {
                    registry: self.name.to_string(),
                    source,
                })?;
                debug!(registry = self.name, entries = documents.len(), "Registry refreshed");
                crate::metrics::set_registry_entries(self.name, documents.len());
                Ok(RegistryIndex::new(documents))
            })
            .await
    }

    pub fn cache_stats(&self) -> TimedCacheStats {
        self.cache.stats()
    }
}

/// Every registry the presenter expands from.
pub struct Registries {
    registries: Vec<Registry>,
}

impl Registries {
    pub fn new(engine: Arc<dyn SearchEngine>, index: &str, lifetime: Duration) -> Self {
        let registries = REGISTRY_DEFINITIONS
            .iter()
            .map(|(name, format, fields)| {
                Registry::new(name, format, fields, index, engine.clone(), lifetime)
            })
            .collect();
        Self { registries }
    }

    pub fn get(&self, name: &str) -> Option<&Registry> {
        self.registries.iter().find(|r| r.name == name)
    }

    /// Load every registry. A registry that cannot be loaded is left out,
    /// so its references are omitted from expansions.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.load(self.registries.iter()).await
    }

    /// Load only the named registries.
    pub async fn snapshot_of(&self, names: &BTreeSet<&str>) -> RegistrySnapshot {
        if names.is_empty() {
            return RegistrySnapshot::empty();
        }
        self.load(self.registries.iter().filter(|r| names.contains(r.name)))
            .await
    }

    async fn load<'r>(&'r self, registries: impl Iterator<Item = &'r Registry>) -> RegistrySnapshot {
        let loads = registries.map(|registry| async move { (registry.name, registry.all().await) });
        let loaded = join_all(loads).await;
        let mut indexes = BTreeMap::new();
        for (name, result) in loaded {
            match result {
                Ok(index) => {
                    indexes.insert(name, index);
                }
                Err(e) => warn!(error = %e, "Registry unavailable, skipping expansion"),
            }
        }
        RegistrySnapshot { indexes }
    }
}

/// Registries as loaded for one request.
#[derive(Debug, Default, Clone)]
pub struct RegistrySnapshot {
    indexes: BTreeMap<&'static str, Arc<RegistryIndex>>,
}

impl RegistrySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&RegistryIndex> {
        self.indexes.get(name).map(Arc::as_ref)
    }

    /// Build a snapshot directly from entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (&'static str, Vec<Map<String, Value>>)>) -> Self {
        Self {
            indexes: entries
                .into_iter()
                .map(|(name, docs)| (name, Arc::new(RegistryIndex::new(docs))))
                .collect(),
        }
    }
}
