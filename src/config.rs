// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the search gateway.
//!
//! # Example
//!
//! ```
//! use search_gateway::GatewayConfig;
//!
//! // Minimal config (uses defaults, in-memory engine)
//! let config = GatewayConfig::default();
//! assert_eq!(config.max_batch_size, 10);
//!
//! // Against a real cluster
//! let config = GatewayConfig {
//!     elasticsearch_url: Some("http://localhost:9200".into()),
//!     engine_timeout_ms: 2000,
//!     ..Default::default()
//! };
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Configuration for the search gateway.
///
/// Every field has a default; an empty JSON object is a valid config.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Elasticsearch base URL (e.g., "http://localhost:9200").
    /// Without one the in-memory engine is used.
    #[serde(default)]
    pub elasticsearch_url: Option<String>,

    /// Per-request engine timeout
    #[serde(default = "default_engine_timeout_ms")]
    pub engine_timeout_ms: u64,

    /// Indexes searched by `/search`
    #[serde(default = "default_content_indexes")]
    pub content_indexes: Vec<String>,

    /// Index holding best and worst bets
    #[serde(default = "default_metasearch_index")]
    pub metasearch_index: String,

    /// Index the entity registries are loaded from
    #[serde(default = "default_registry_index")]
    pub registry_index: String,

    /// Index searched by `/specialist-documents-search`
    #[serde(default = "default_specialist_index")]
    pub specialist_index: String,

    /// Indexes reachable through `/<index>/advanced_search.json`
    #[serde(default = "default_legacy_indexes")]
    pub legacy_indexes: Vec<String>,

    /// Registry cache lifetime in seconds
    #[serde(default = "default_registry_cache_secs")]
    pub registry_cache_secs: u64,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    #[serde(default = "default_max_query_words")]
    pub max_query_words: usize,
    #[serde(default = "default_max_legacy_page")]
    pub max_legacy_page: usize,

    /// Characters of description shown around a highlight
    #[serde(default = "default_description_budget")]
    pub description_budget: usize,

    /// Word list for spelling suggestions, one word per line
    #[serde(default)]
    pub spelling_dictionary: Option<PathBuf>,
    /// Words never corrected
    #[serde(default)]
    pub spelling_ignore: Vec<String>,
    /// Words never suggested
    #[serde(default)]
    pub spelling_blacklist: Vec<String>,
}

fn default_listen_addr() -> String { "127.0.0.1:3009".into() }
fn default_engine_timeout_ms() -> u64 { 5000 }
fn default_content_indexes() -> Vec<String> {
    vec!["govuk".into(), "government".into(), "detailed".into()]
}
fn default_metasearch_index() -> String { "metasearch".into() }
fn default_registry_index() -> String { "government".into() }
fn default_specialist_index() -> String { "specialist-finder".into() }
fn default_legacy_indexes() -> Vec<String> {
    vec!["mainstream".into(), "detailed".into(), "government".into()]
}
fn default_registry_cache_secs() -> u64 { 300 }
fn default_max_batch_size() -> usize { 10 }
fn default_max_count() -> usize { 1000 }
fn default_max_query_words() -> usize { 1024 }
fn default_max_legacy_page() -> usize { 500_000 }
fn default_description_budget() -> usize { 225 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            elasticsearch_url: None,
            engine_timeout_ms: default_engine_timeout_ms(),
            content_indexes: default_content_indexes(),
            metasearch_index: default_metasearch_index(),
            registry_index: default_registry_index(),
            specialist_index: default_specialist_index(),
            legacy_indexes: default_legacy_indexes(),
            registry_cache_secs: default_registry_cache_secs(),
            max_batch_size: default_max_batch_size(),
            max_count: default_max_count(),
            max_query_words: default_max_query_words(),
            max_legacy_page: default_max_legacy_page(),
            description_budget: default_description_budget(),
            spelling_dictionary: None,
            spelling_ignore: Vec::new(),
            spelling_blacklist: Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayConfig {
    /// Load a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    #[must_use]
    pub fn registry_lifetime(&self) -> Duration {
        Duration::from_secs(self.registry_cache_secs)
    }
}
