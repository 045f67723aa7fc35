//! Read-through cache for aggregate reads
//!
//! Values are computed on a miss and kept for a fixed TTL. Only successful
//! computations are cached, so a failed read is retried on the next call.
//! Counters live next to the cached values but never expire.

mod memory;
mod postgres;

pub use memory::MemoryCache;
pub use postgres::PgCache;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache value could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage for serialized values with expiry, plus persistent counters
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Live value for `key`; expired values read as `None`
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Add one to the counter and return the new value
    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// Current counter value; a missing counter is 0
    async fn counter(&self, key: &str) -> CacheResult<i64>;

    /// Overwrite the counter with `value`
    async fn set_counter(&self, key: &str, value: i64) -> CacheResult<()>;
}

/// Hex SHA-256 of a cache key, used where keys must have a bounded size
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, or compute and cache it
    ///
    /// A backend read error is returned as is. A backend write error after a
    /// successful compute is only logged.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(raw) = self.backend.get(key).await? {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(value);
                },
                Err(e) => warn!(key = %key, error = %e, "Discarding undecodable cached value"),
            }
        }

        debug!(key = %key, "Cache miss");
        let value = compute().await?;

        if let Err(e) = self.store(key, &value).await {
            warn!(key = %key, error = %e, "Failed to write cache entry");
        }

        Ok(value)
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw, self.ttl).await
    }

    pub async fn increment(&self, key: &str) -> CacheResult<i64> {
        self.backend.incr(key).await
    }

    pub async fn counter(&self, key: &str) -> CacheResult<i64> {
        self.backend.counter(key).await
    }

    pub async fn set_counter(&self, key: &str, value: i64) -> CacheResult<()> {
        self.backend.set_counter(key, value).await
    }
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Failed;

    impl From<CacheError> for Failed {
        fn from(_: CacheError) -> Self {
            Failed
        }
    }

    /// Backend whose reads or writes always fail
    struct Broken {
        reads: bool,
    }

    #[async_trait]
    impl CacheBackend for Broken {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            if self.reads {
                Err(CacheError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(None)
            }
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn incr(&self, _key: &str) -> CacheResult<i64> {
            Err(CacheError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn counter(&self, _key: &str) -> CacheResult<i64> {
            Ok(0)
        }

        async fn set_counter(&self, _key: &str, _value: i64) -> CacheResult<()> {
            Err(CacheError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn cache() -> ReadThroughCache {
        ReadThroughCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_hit_skips_compute() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Failed>(42_i64)
        };

        assert_eq!(cache.get_or_compute("stats:entries", compute).await, Ok(42));
        assert_eq!(cache.get_or_compute("stats:entries", compute).await, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_compute_is_not_cached() {
        let cache = cache();

        let first: Result<i64, Failed> = cache.get_or_compute("k", || async { Err(Failed) }).await;
        assert_eq!(first, Err(Failed));

        let second: Result<i64, Failed> = cache.get_or_compute("k", || async { Ok(7) }).await;
        assert_eq!(second, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_expires_after_ttl() {
        let cache = ReadThroughCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));

        let v: Result<String, Failed> = cache.get_or_compute("k", || async { Ok("a".into()) }).await;
        assert_eq!(v, Ok("a".to_string()));

        tokio::time::advance(Duration::from_secs(59)).await;
        let v: Result<String, Failed> = cache.get_or_compute("k", || async { Ok("b".into()) }).await;
        assert_eq!(v, Ok("a".to_string()));

        tokio::time::advance(Duration::from_secs(2)).await;
        let v: Result<String, Failed> = cache.get_or_compute("k", || async { Ok("b".into()) }).await;
        assert_eq!(v, Ok("b".to_string()));
    }

    #[tokio::test]
    async fn test_read_error_is_returned() {
        let cache = ReadThroughCache::new(Arc::new(Broken { reads: true }), Duration::from_secs(1));
        let calls = AtomicUsize::new(0);

        let result: Result<i64, Failed> = cache
            .get_or_compute("k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;

        assert_eq!(result, Err(Failed));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_error_still_returns_value() {
        let cache = ReadThroughCache::new(Arc::new(Broken { reads: false }), Duration::from_secs(1));
        let result: Result<i64, Failed> = cache.get_or_compute("k", || async { Ok(5) }).await;
        assert_eq!(result, Ok(5));
    }

    #[tokio::test]
    async fn test_counters() {
        let cache = cache();
        assert_eq!(cache.counter("stats:downloads").await.unwrap(), 0);
        assert_eq!(cache.increment("stats:downloads").await.unwrap(), 1);
        assert_eq!(cache.increment("stats:downloads").await.unwrap(), 2);
        assert_eq!(cache.counter("stats:downloads").await.unwrap(), 2);
    }

    #[test]
    fn test_hash_key() {
        assert_eq!(
            hash_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_key("list:").len(), 64);
    }
}
