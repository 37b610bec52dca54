//! Redis-backed key/value store for production deployments.
//!
//! Uses one multiplexed connection, cloned per call. Every command is a
//! self-contained round trip bounded by the configured timeout, so callers
//! can share the adapter without locking.
//!
//! Pattern operations use `SCAN ... MATCH ... COUNT` rather than `KEYS`, so
//! no single call lists an unbounded keyspace. See the port documentation
//! for the eventual-cleanup contract of the bulk deletes.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, IntoConnectionInfo, RedisResult};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RedisConfig;
use crate::domain::KeyPattern;
use crate::ports::{check_key, check_pattern, CacheError, KeyValueStore};

const MATCH_ALL: &str = "*";

/// Redis key/value store adapter.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
    timeout: Duration,
    scan_count: usize,
    max_delete_passes: u32,
}

impl RedisCache {
    /// Connect to Redis and verify the connection with `PING`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let mut info = config
            .url()
            .into_connection_info()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        info.redis.password = config.password();
        info.redis.db = config.db;

        let client =
            redis::Client::open(info).map_err(|e| CacheError::Unavailable(e.to_string()))?;

        let timeout = config.timeout();
        let conn = match tokio::time::timeout(timeout, client.get_multiplexed_tokio_connection())
            .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(CacheError::Unavailable(e.to_string())),
            Err(_) => return Err(CacheError::Timeout(timeout)),
        };

        let cache = Self::new(conn, config);
        cache.ping().await?;

        info!(
            address = %config.address(),
            db = config.db,
            "Connected to Redis"
        );
        Ok(cache)
    }

    /// Create an adapter over an existing connection.
    pub fn new(conn: MultiplexedConnection, config: &RedisConfig) -> Self {
        Self {
            conn,
            timeout: config.timeout(),
            scan_count: config.scan_count.max(1),
            max_delete_passes: config.max_delete_passes.max(1),
        }
    }

    /// Round-trip health check.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let cmd = redis::cmd("PING");
        let _: String = self.run(cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    /// Bounds a command by the configured timeout and maps its error.
    async fn run<T, F>(&self, command: F) -> Result<T, CacheError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::Unavailable(e.to_string())),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }

    /// One `SCAN` page: the next cursor and the keys it returned.
    async fn scan_page(&self, cursor: u64, glob: &str) -> Result<(u64, Vec<String>), CacheError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(glob)
            .arg("COUNT")
            .arg(self.scan_count);
        self.run(cmd.query_async::<_, (u64, Vec<String>)>(&mut conn))
            .await
    }

    /// Full cursor iteration collecting every key matching `glob`.
    ///
    /// SCAN may return a key more than once while the keyspace is being
    /// rehashed, so results are deduplicated.
    async fn scan_matching(&self, glob: &str) -> Result<Vec<String>, CacheError> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next, page) = self.scan_page(cursor, glob).await?;
            for key in page {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            cursor = next;
            if cursor == 0 {
                return Ok(keys);
            }
        }
    }

    /// Deletes `keys` in chunks of the scan batch size. Returns how many
    /// keys the store reported as removed.
    async fn delete_keys(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut removed = 0u64;
        for chunk in keys.chunks(self.scan_count) {
            let mut conn = self.conn.clone();
            let count: u64 = self.run(conn.del(chunk.to_vec())).await?;
            removed += count;
        }
        Ok(removed)
    }
}

#[async_trait]
impl KeyValueStore for RedisCache {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        check_key(key)?;
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if !ttl.is_zero() {
            // PX rejects 0, so sub-millisecond TTLs round up.
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        self.run(cmd.query_async::<_, ()>(&mut conn)).await?;
        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cache entry set");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        check_key(key)?;
        let mut conn = self.conn.clone();
        let value: Option<String> = self.run(conn.get(key)).await?;
        if value.is_none() {
            debug!(key = %key, "Cache miss");
        }
        Ok(value)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        check_key(key)?;
        let mut conn = self.conn.clone();
        self.run(conn.exists(key)).await
    }

    async fn delete_if_exists(&self, key: &str) -> Result<(), CacheError> {
        if self.exists(key).await? {
            let mut conn = self.conn.clone();
            let _: u64 = self.run(conn.del(key)).await?;
            debug!(key = %key, "Cache entry deleted");
        }
        Ok(())
    }

    async fn find_one(&self, pattern: &KeyPattern) -> Result<String, CacheError> {
        check_pattern(pattern)?;
        let glob = pattern.to_glob();
        let mut keys = self.scan_matching(&glob).await?;

        match keys.len() {
            0 => {
                debug!(pattern = %glob, "No key matches pattern");
                Err(CacheError::not_found(glob))
            }
            1 => {
                let key = keys.remove(0);
                debug!(pattern = %glob, key = %key, "Found unique key for pattern");
                Ok(key)
            }
            count => {
                warn!(
                    pattern = %glob,
                    count = count,
                    "Pattern expected to be unique matched several keys"
                );
                Err(CacheError::Ambiguous {
                    pattern: glob,
                    count,
                })
            }
        }
    }

    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<(), CacheError> {
        check_pattern(pattern)?;
        let glob = pattern.to_glob();
        let mut total = 0u64;

        for pass in 1..=self.max_delete_passes {
            let keys = self.scan_matching(&glob).await?;
            if keys.is_empty() {
                debug!(pattern = %glob, deleted = total, passes = pass, "Pattern delete settled");
                return Ok(());
            }
            total += self.delete_keys(&keys).await?;
            info!(pattern = %glob, pass = pass, batch = keys.len(), "Deleted keys matching pattern");
        }

        warn!(
            pattern = %glob,
            deleted = total,
            passes = self.max_delete_passes,
            "Keys still matching after final delete pass; concurrent writers may have added them"
        );
        Ok(())
    }

    async fn delete_all_keys(&self) -> Result<(), CacheError> {
        let mut cursor = 0u64;
        let mut total = 0u64;
        loop {
            let (next, keys) = self.scan_page(cursor, MATCH_ALL).await?;
            if !keys.is_empty() {
                total += self.delete_keys(&keys).await?;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        info!(deleted = total, "Deleted all cache keys");
        Ok(())
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("timeout", &self.timeout)
            .field("scan_count", &self.scan_count)
            .field("max_delete_passes", &self.max_delete_passes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    // These tests require Redis on 127.0.0.1:6379 and use database 15.
    // Run with: cargo test -- --ignored
    use super::*;

    async fn connect() -> RedisCache {
        let config = RedisConfig {
            host: "127.0.0.1".to_string(),
            db: 15,
            ..Default::default()
        };
        let cache = RedisCache::connect(&config).await.unwrap();
        cache.delete_all_keys().await.unwrap();
        cache
    }

    #[tokio::test]
    #[ignore]
    async fn set_get_and_expire() {
        let cache = connect().await;
        cache
            .set_with_expiry("sess:42", "online", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(cache.get("sess:42").await.unwrap().as_deref(), Some("online"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(cache.get("sess:42").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore]
    async fn prefix_cleanup_leaves_no_match() {
        let cache = connect().await;
        for i in 0..1200 {
            cache
                .set_with_expiry(&format!("user_{}", i), "x", Duration::from_secs(60))
                .await
                .unwrap();
        }
        cache.set_with_expiry("keep", "x", Duration::from_secs(60)).await.unwrap();

        cache.delete_by_prefix("user_").await.unwrap();

        assert!(cache.find_one_by_prefix("user_").await.unwrap_err().is_not_found());
        assert_eq!(cache.find_one_by_prefix("ke").await.unwrap(), "keep");
    }

    #[tokio::test]
    #[ignore]
    async fn delete_all_keys_empties_database() {
        let cache = connect().await;
        for i in 0..50 {
            cache
                .set_with_expiry(&format!("k{}", i), "x", Duration::ZERO)
                .await
                .unwrap();
        }
        cache.delete_all_keys().await.unwrap();
        let (_, keys) = cache.scan_page(0, MATCH_ALL).await.unwrap();
        assert!(keys.is_empty());
    }
}
