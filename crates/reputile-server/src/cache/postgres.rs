use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{hash_key, CacheBackend, CacheResult};

/// Cache kept in the `cache_entries` and `counters` tables
#[derive(Debug, Clone)]
pub struct PgCache {
    pool: PgPool,
}

impl PgCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired values; returns how many were removed
    ///
    /// Runs on every [`CacheBackend::set`], so the table stays bounded by the
    /// keys written within one ttl.
    pub async fn purge_expired(&self) -> CacheResult<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(count = result.rows_affected(), "Purged expired cache entries");
        }
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheBackend for PgCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM cache_entries WHERE key_hash = $1 AND expires_at > NOW()",
        )
        .bind(hash_key(key))
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.purge_expired().await?;

        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key_hash, key, value, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key_hash) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(hash_key(key))
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO counters (key, value) VALUES ($1, 1)
            ON CONFLICT (key) DO UPDATE SET value = counters.value + 1
            RETURNING value
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    async fn counter(&self, key: &str) -> CacheResult<i64> {
        let value = sqlx::query_scalar::<_, i64>("SELECT value FROM counters WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.unwrap_or(0))
    }

    async fn set_counter(&self, key: &str, value: i64) -> CacheResult<()> {
        sqlx::query(
            r#"
            INSERT INTO counters (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
