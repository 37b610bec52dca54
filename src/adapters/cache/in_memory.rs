//! In-memory key/value store for testing and development.
//!
//! Mirrors the store-side semantics the production adapter relies on:
//! entries expire on their own deadline, pattern scans follow the store's
//! glob dialect, and bulk deletes work in scan passes. Deadlines use
//! `tokio::time::Instant`, so tests can drive expiry with paused time.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::KeyPattern;
use crate::ports::{check_key, check_pattern, CacheError, KeyValueStore};

const DEFAULT_MAX_DELETE_PASSES: u32 = 32;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

/// In-memory key/value store.
///
/// Cloning shares the underlying map, so clones behave like several
/// connections to one store.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    max_delete_passes: u32,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_delete_passes: DEFAULT_MAX_DELETE_PASSES,
        }
    }

    /// Set the upper bound on scan passes for pattern deletes.
    pub fn with_max_delete_passes(mut self, passes: u32) -> Self {
        self.max_delete_passes = passes.max(1);
        self
    }

    // === Test Helpers ===

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys = self.snapshot(None).await;
        keys.sort();
        keys
    }

    /// Live keys matching `pattern`; every key when `pattern` is `None`.
    async fn snapshot(&self, pattern: Option<&KeyPattern>) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|(key, entry)| {
                entry.is_live(now) && pattern.map_or(true, |p| p.matches(key))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    async fn remove_all(&self, keys: &[String]) -> usize {
        let mut entries = self.entries.write().await;
        keys.iter().filter(|k| entries.remove(*k).is_some()).count()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryCache {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        check_key(key)?;
        // Zero, or a TTL past the clock's range, stores without expiry.
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        check_key(key)?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                tracing::debug!(key = %key, "Cache miss (expired)");
                Ok(None)
            }
            None => {
                tracing::debug!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        check_key(key)?;
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|e| e.is_live(now)))
    }

    async fn delete_if_exists(&self, key: &str) -> Result<(), CacheError> {
        if self.exists(key).await? {
            self.entries.write().await.remove(key);
        }
        Ok(())
    }

    async fn find_one(&self, pattern: &KeyPattern) -> Result<String, CacheError> {
        check_pattern(pattern)?;
        let mut matches = self.snapshot(Some(pattern)).await;
        match matches.len() {
            0 => Err(CacheError::not_found(pattern.to_glob())),
            1 => Ok(matches.remove(0)),
            count => Err(CacheError::Ambiguous {
                pattern: pattern.to_glob(),
                count,
            }),
        }
    }

    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<(), CacheError> {
        check_pattern(pattern)?;
        for _ in 0..self.max_delete_passes {
            let keys = self.snapshot(Some(pattern)).await;
            if keys.is_empty() {
                return Ok(());
            }
            self.remove_all(&keys).await;
        }
        tracing::warn!(
            pattern = %pattern,
            passes = self.max_delete_passes,
            "Keys still matching after final delete pass"
        );
        Ok(())
    }

    async fn delete_all_keys(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
