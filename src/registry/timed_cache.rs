// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Timed cache with single-flight refresh.
//!
//! # Flow
//!
//! ```text
//! get_or_refresh(key, fetch)
//!       │
//!       ├─→ fresh entry → return it
//!       │
//!       ▼
//! ┌───────────────────────────────┐
//! │  per-key refresh lock         │
//! │  (concurrent callers wait     │
//! │   for the in-flight fetch)    │
//! └───────────────────────────────┘
//!       │
//!       ├─→ refreshed meanwhile → return it
//!       │
//!       └─→ fetch
//!             ├─→ Ok  → store, return
//!             └─→ Err → stale value if any, else the error
//! ```
//!
//! Values are swapped in whole behind an `Arc`; a reader never sees a
//! partially updated value.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    fetched_at: Instant,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            fetched_at: self.fetched_at,
        }
    }
}

pub struct TimedCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    refresh_locks: DashMap<K, Arc<Mutex<()>>>,
    lifetime: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
    stale_served: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct TimedCacheStats {
    pub hits: u64,
    /// Lookups that needed a fetch
    pub misses: u64,
    /// Fetches that failed
    pub failures: u64,
    /// Failed refreshes answered with the expired value
    pub stale_served: u64,
    pub entry_count: usize,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(lifetime: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            refresh_locks: DashMap::new(),
            lifetime,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
        }
    }

    fn fresh(&self, key: &K) -> Option<Arc<V>> {
        let entry = self.entries.get(key)?;
        (entry.fetched_at.elapsed() < self.lifetime).then(|| entry.value.clone())
    }

    /// Cached value for `key`, fetching it when absent or expired.
    pub async fn get_or_refresh<F, Fut, E>(&self, key: &K, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.fresh(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let lock = self.refresh_locks.entry(key.clone()).or_default().clone();
        let _guard = lock.lock().await;

        if let Some(value) = self.fresh(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        match fetch().await {
            Ok(value) => {
                let value = Arc::new(value);
                self.entries.insert(
                    key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(value)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let stale = self.entries.get(key).map(|entry| entry.value.clone());
                match stale {
                    Some(value) => {
                        self.stale_served.fetch_add(1, Ordering::Relaxed);
                        Ok(value)
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> TimedCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        TimedCacheStats {
            hits,
            misses,
            failures: self.failures.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            entry_count: self.entries.len(),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.entries.clear();
    }
}
