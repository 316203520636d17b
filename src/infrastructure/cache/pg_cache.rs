//! PostgreSQL-backed cache implementation.

use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;

/// Cache stored in the UNLOGGED `cache` table.
///
/// Entries carry their write time; anything older than the configured TTL reads
/// as a miss and is overwritten on the next `set`. Database errors surface as
/// [`super::CacheError`]; the typed helpers treat them as misses.
pub struct PgCache {
    pool: Arc<PgPool>,
    ttl_seconds: i64,
}

impl PgCache {
    pub fn new(pool: Arc<PgPool>, ttl_seconds: u64) -> Self {
        Self {
            pool,
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
        }
    }

    /// Deletes entries past their TTL. Returns the number removed.
    pub async fn purge_expired(&self) -> CacheResult<u64> {
        let result = sqlx::query(
            "DELETE FROM cache WHERE created_at_utc <= NOW() - make_interval(secs => $1)",
        )
        .bind(self.ttl_seconds as f64)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheService for PgCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let row: Option<Option<Value>> = sqlx::query_scalar(
            r#"
            SELECT value FROM cache
            WHERE key = $1 AND created_at_utc > NOW() - make_interval(secs => $2)
            "#,
        )
        .bind(key)
        .bind(self.ttl_seconds as f64)
        .fetch_optional(self.pool.as_ref())
        .await?;

        match row {
            Some(Some(value)) => {
                debug!("Cache HIT: {}", key);
                Ok(Some(value))
            }
            _ => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &Value) -> CacheResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cache (key, value, created_at_utc)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, created_at_utc = EXCLUDED.created_at_utc
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool.as_ref())
        .await?;

        debug!("Cache SET: {}", key);
        Ok(())
    }

    async fn remove_by_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let pattern = format!("{}%", escape_like(prefix));

        let result = sqlx::query(r"DELETE FROM cache WHERE key LIKE $1 ESCAPE '\'")
            .bind(pattern)
            .execute(self.pool.as_ref())
            .await?;

        debug!("Cache EVICT: {}* ({} rows)", prefix, result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1 FROM cache LIMIT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("habits:u_1:"), r"habits:u\_1:");
        assert_eq!(escape_like("100%"), r"100\%");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
