//! In-memory TTL cache for provider responses
//!
//! Keys follow `operation:provider:url`. Entries expire after the configured
//! TTL. An expired entry is dropped when read, and every write sweeps all
//! expired entries so keys that are never read again do not accumulate.
//! Two concurrent misses for the same key both run their fetch; the last one
//! to finish wins.

use dashmap::DashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::types::ProviderId;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache<V: Clone> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Build the cache key for one provider operation
    pub fn key(operation: &str, provider: ProviderId, url: &str) -> String {
        format!("{}:{}:{}", operation, provider.display_name().to_ascii_lowercase(), url)
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        }

        // Expired: drop it (the read guard above is released by now)
        self.entries
            .remove_if(key, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.evict_expired();
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Return the cached value or run `fetch` and store its `Ok` result
    ///
    /// Errors are passed through and never cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!(key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(key, "Cache miss");
        let value = fetch().await?;
        self.set(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry
    fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }
}
