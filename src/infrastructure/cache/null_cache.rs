//! No-op cache implementation for testing or disabled caching.

use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// A cache implementation that does nothing.
///
/// Used when `CACHE_ENABLED=false`. Every read is a miss and every write is discarded.
pub struct NullCache;

impl NullCache {
    /// Creates a new NullCache instance.
    pub fn new() -> Self {
        debug!("Using NullCache (caching disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for NullCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Value>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &Value) -> CacheResult<()> {
        Ok(())
    }

    async fn remove_by_prefix(&self, _prefix: &str) -> CacheResult<u64> {
        Ok(0)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::{get_typed, set_typed};

    #[tokio::test]
    async fn test_null_cache_never_hits() {
        let cache = NullCache::new();
        set_typed(&cache, "habits:u_1:", &vec![1, 2, 3]).await;

        let hit: Option<Vec<i32>> = get_typed(&cache, "habits:u_1:").await;
        assert!(hit.is_none());
        assert_eq!(cache.remove_by_prefix("habits:").await.unwrap(), 0);
        assert!(cache.health_check().await);
    }
}
