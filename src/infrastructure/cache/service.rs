//! Cache service trait and error types.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),
    #[error("Cache operation error: {0}")]
    OperationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => CacheError::ConnectionError(e.to_string()),
            other => CacheError::OperationError(other.to_string()),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store for serialized API responses.
///
/// Implementations must be thread-safe. Backend failures are returned as
/// [`CacheError`]; [`get_typed`], [`set_typed`] and [`evict`] log them and
/// carry on, so a failing backend behaves like an empty cache.
///
/// # Key Layout
///
/// Keys are colon-separated and start with the resource and the owning user,
/// e.g. `habits:{user_id}:...`, so a whole user's view can be evicted with
/// [`CacheService::remove_by_prefix`].
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::PgCache`] - PostgreSQL table with TTL on read
/// - [`crate::infrastructure::cache::NullCache`] - No-op implementation for disabled caching
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Returns the stored value, or `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value and restarting its TTL.
    async fn set(&self, key: &str, value: &Value) -> CacheResult<()>;

    /// Removes every entry whose key starts with `prefix`. Returns the number removed.
    async fn remove_by_prefix(&self, prefix: &str) -> CacheResult<u64>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;
}

/// Reads a cached value and deserializes it into `T`.
///
/// Entries that no longer match `T` are treated as misses.
pub async fn get_typed<T: DeserializeOwned>(cache: &dyn CacheService, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Cache read failed");
            None
        }
    }
}

/// Serializes `value` and stores it. Failures are logged and ignored.
pub async fn set_typed<T: Serialize + Sync>(cache: &dyn CacheService, key: &str, value: &T) {
    let json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to serialize cache entry");
            return;
        }
    };

    if let Err(e) = cache.set(key, &json).await {
        tracing::warn!(key, error = %e, "Cache write failed");
    }
}

/// Evicts a key prefix, logging instead of failing.
pub async fn evict(cache: &dyn CacheService, prefix: &str) {
    if let Err(e) = cache.remove_by_prefix(prefix).await {
        tracing::warn!(prefix, error = %e, "Cache eviction failed");
    }
}
