//! KeyValueStore port - ephemeral state with expiry and pattern invalidation.
//!
//! Holds session, presence and transient lookup state. Entries expire on the
//! store side; the adapter never tracks deadlines itself.
//!
//! # Pattern operations are not atomic
//!
//! Every scan returns a snapshot. A key written between the scan and the
//! action that follows it (delete, uniqueness check) is not seen by that
//! call. The bulk delete operations therefore promise *eventual cleanup*:
//! they repeat scan passes until one pass observes no matches, bounded by
//! a configured pass limit. They never take cross-call locks.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::KeyPattern;

/// Errors returned by key/value store adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// No key (or no key matching a pattern) exists. Only returned by the
    /// strict and unique-match lookups.
    #[error("not found: {target}")]
    NotFound { target: String },

    /// More than one key matches an affix expected to be unique.
    #[error("ambiguous match for '{pattern}': {count} keys")]
    Ambiguous { pattern: String, count: usize },

    /// Transport or protocol failure talking to the store.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A round trip exceeded the configured timeout.
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl CacheError {
    pub fn not_found(target: impl Into<String>) -> Self {
        CacheError::NotFound {
            target: target.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }

    /// Whether the error came from the transport rather than from the data.
    pub fn is_transport(&self) -> bool {
        matches!(self, CacheError::Unavailable(_) | CacheError::Timeout(_))
    }
}

/// Rejects the empty key.
pub(crate) fn check_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

/// Rejects empty affixes and globs. An empty prefix would select the whole
/// keyspace, which has its own operation.
pub(crate) fn check_pattern(pattern: &KeyPattern) -> Result<(), CacheError> {
    if pattern.raw().is_empty() {
        return Err(CacheError::InvalidKey(
            "pattern must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Port for the remote key/value store.
///
/// Implementations are safe for concurrent use without external locking.
/// No operation is retried internally; retry policy belongs to the caller.
/// Dropping a returned future cancels the in-flight round trip.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// A zero `ttl` stores the entry without expiry.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), CacheError>;

    /// Reads `key`. A miss is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Reads `key`, treating a miss as [`CacheError::NotFound`].
    async fn get_strict(&self, key: &str) -> Result<String, CacheError> {
        self.get(key)
            .await?
            .ok_or_else(|| CacheError::not_found(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Deletes `key` if it exists. Succeeds whether or not it existed.
    async fn delete_if_exists(&self, key: &str) -> Result<(), CacheError>;

    /// Returns the single key matching `pattern`.
    ///
    /// Zero matches is [`CacheError::NotFound`]; two or more is
    /// [`CacheError::Ambiguous`], since the pattern is expected to identify
    /// one derived key.
    async fn find_one(&self, pattern: &KeyPattern) -> Result<String, CacheError>;

    /// Deletes every key matching `pattern` until one scan pass observes no
    /// matches. Keys written concurrently may survive. Zero deletions is
    /// success.
    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<(), CacheError>;

    /// Deletes every key in the keyspace using a resumable cursor.
    async fn delete_all_keys(&self) -> Result<(), CacheError>;

    async fn find_one_by_prefix(&self, prefix: &str) -> Result<String, CacheError> {
        self.find_one(&KeyPattern::prefix(prefix)).await
    }

    async fn find_one_by_suffix(&self, suffix: &str) -> Result<String, CacheError> {
        self.find_one(&KeyPattern::suffix(suffix)).await
    }

    /// Eventual cleanup of keys matching a raw glob. See [`delete_matching`](Self::delete_matching).
    async fn delete_by_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        self.delete_matching(&KeyPattern::glob(pattern)).await
    }

    /// Eventual cleanup of keys starting with `prefix` (taken literally).
    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.delete_matching(&KeyPattern::prefix(prefix)).await
    }

    /// Eventual cleanup of keys ending with `suffix` (taken literally).
    async fn delete_by_suffix(&self, suffix: &str) -> Result<(), CacheError> {
        self.delete_matching(&KeyPattern::suffix(suffix)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn KeyValueStore) {}

    #[test]
    fn not_found_displays_target() {
        let err = CacheError::not_found("sess:42");
        assert_eq!(err.to_string(), "not found: sess:42");
        assert!(err.is_not_found());
        assert!(!err.is_transport());
    }

    #[test]
    fn ambiguous_is_distinct_from_not_found() {
        let err = CacheError::Ambiguous {
            pattern: "user_*".to_string(),
            count: 3,
        };
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("3 keys"));
    }

    #[test]
    fn empty_keys_and_patterns_are_rejected() {
        assert!(check_key("").is_err());
        assert!(check_key("sess:1").is_ok());
        assert!(check_pattern(&KeyPattern::prefix("")).is_err());
        assert!(check_pattern(&KeyPattern::suffix("_conn")).is_ok());
    }

    #[test]
    fn transport_classification() {
        assert!(CacheError::Unavailable("refused".to_string()).is_transport());
        assert!(CacheError::Timeout(Duration::from_secs(1)).is_transport());
    }
}
