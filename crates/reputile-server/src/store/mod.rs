//! Persistent entry store
//!
//! Entries are keyed by their identity key (`source|domain|ip`). Writing an
//! entry that already exists only refreshes its last-seen time, category and
//! description. Rows that are not refreshed within the staleness window are
//! removed by [`EntryStore::prune`].

mod filter;
mod memory;
pub mod net;
mod postgres;

pub use filter::{EntryFilter, FILTER_KEYS};
pub use memory::MemoryEntryStore;
pub use net::IpNet;
pub use postgres::PgEntryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use reputile_ingest::Entry;
use thiserror::Error;

/// Rows of a `find`; a failure is always the last element
pub type EntryStream = BoxStream<'static, StoreResult<Entry>>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid filter value {value:?} for '{key}'")]
    InvalidFilter { key: String, value: String },

    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    #[error("Prune age {0} reaches past the earliest representable time")]
    InvalidMaxAge(chrono::Duration),
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert or refresh `entry`, recording `seen_at` as its last-seen time
    async fn upsert_at(&self, entry: &Entry, seen_at: DateTime<Utc>) -> StoreResult<()>;

    async fn upsert(&self, entry: &Entry) -> StoreResult<()> {
        self.upsert_at(entry, Utc::now()).await
    }

    /// Delete rows last seen before `cutoff`; returns how many were removed
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    async fn prune(&self, max_age: chrono::Duration) -> StoreResult<u64> {
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .ok_or(StoreError::InvalidMaxAge(max_age))?;
        self.prune_older_than(cutoff).await
    }

    /// Matching rows ordered by source, domain and ip
    fn find(&self, filter: &EntryFilter) -> EntryStream;

    async fn count_entries(&self) -> StoreResult<i64>;

    /// Number of distinct sources with at least one row
    async fn count_sources(&self) -> StoreResult<i64>;
}
