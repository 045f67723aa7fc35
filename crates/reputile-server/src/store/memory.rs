use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reputile_ingest::Entry;
use tokio::sync::RwLock;

use super::{EntryFilter, EntryStore, EntryStream, StoreResult};

/// Identity of a row in find order; rows without an address sort last
type RowKey = (String, String, bool, Option<IpAddr>);

fn row_key(entry: &Entry) -> RowKey {
    (
        entry.source.clone(),
        entry.domain.clone(),
        entry.ip.is_none(),
        entry.ip,
    )
}

/// Process-local store with the same semantics as [`super::PgEntryStore`]
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    rows: Arc<RwLock<BTreeMap<RowKey, Entry>>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn upsert_at(&self, entry: &Entry, seen_at: DateTime<Utc>) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows.entry(row_key(entry)).or_insert_with(|| entry.clone());

        row.category.clone_from(&entry.category);
        row.description.clone_from(&entry.description);
        row.last_seen = Some(seen_at);

        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| row.last_seen.is_some_and(|last| last >= cutoff));
        Ok((before - rows.len()) as u64)
    }

    fn find(&self, filter: &EntryFilter) -> EntryStream {
        let filter = filter.clone();
        let rows = Arc::clone(&self.rows);
        // snapshot at first poll; later writes are not observed by this stream
        let rows = async move {
            let guard = rows.read().await;
            let matching: Vec<StoreResult<Entry>> = guard
                .values()
                .filter(|row| filter.matches(row))
                .cloned()
                .map(Ok)
                .collect();
            matching
        };
        stream::once(rows).flat_map(stream::iter).boxed()
    }

    async fn count_entries(&self) -> StoreResult<i64> {
        Ok(self.rows.read().await.len() as i64)
    }

    async fn count_sources(&self) -> StoreResult<i64> {
        let rows = self.rows.read().await;
        let mut sources: Vec<&str> = rows.keys().map(|(source, ..)| source.as_str()).collect();
        sources.dedup();
        Ok(sources.len() as i64)
    }
}
