use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{CacheBackend, CacheResult};

/// Expiry instant; `None` when the ttl reaches past what the clock can represent
type Expiry = Option<Instant>;

fn live(expires_at: &Expiry, now: Instant) -> bool {
    expires_at.map_or(true, |expires_at| now < expires_at)
}

/// Process-local cache; expiry follows the tokio clock
#[derive(Debug, Default)]
pub struct MemoryCache {
    values: RwLock<HashMap<String, (String, Expiry)>>,
    counters: RwLock<HashMap<String, i64>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|(_, expires_at)| live(expires_at, Instant::now()))
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut values = self.values.write().await;
        values.retain(|_, (_, expires_at)| live(expires_at, now));
        values.insert(key.to_string(), (value.to_string(), now.checked_add(ttl)));
        Ok(())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut counters = self.counters.write().await;
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn counter(&self, key: &str) -> CacheResult<i64> {
        Ok(self.counters.read().await.get(key).copied().unwrap_or(0))
    }

    async fn set_counter(&self, key: &str, value: i64) -> CacheResult<()> {
        self.counters.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
