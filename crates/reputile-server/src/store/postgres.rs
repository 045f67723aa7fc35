use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use reputile_ingest::Entry;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{EntryFilter, EntryStore, EntryStream, StoreError, StoreResult};

/// Rows buffered between the query task and the consumer of a `find`
const FIND_BUFFER: usize = 256;

/// Entry store backed by the `entries` table
#[derive(Debug, Clone)]
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    source: String,
    domain: String,
    ip: Option<String>,
    category: String,
    description: String,
    last: DateTime<Utc>,
}

impl TryFrom<EntryRow> for Entry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let ip = match row.ip {
            Some(raw) => Some(raw.parse().map_err(|_| {
                StoreError::InvalidRow(format!("address '{}' for source '{}'", raw, row.source))
            })?),
            None => None,
        };

        Ok(Entry {
            source: row.source,
            domain: row.domain,
            ip,
            category: row.category,
            description: row.description,
            last_seen: Some(row.last),
        })
    }
}

fn find_query(filter: &EntryFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(
        "SELECT source, domain, host(ip) AS ip, category, description, last FROM entries WHERE TRUE",
    );

    if let Some(source) = &filter.source {
        query.push(" AND source = ").push_bind(source.clone());
    }
    if let Some(domain) = &filter.domain {
        query.push(" AND domain = ").push_bind(domain.clone());
    }
    if let Some(net) = &filter.ip {
        query
            .push(" AND ip <<= ")
            .push_bind(net.to_string())
            .push("::inet");
    }
    if let Some(after) = filter.last_after {
        query.push(" AND last > ").push_bind(after);
    }
    if let Some(category) = &filter.category {
        query.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(description) = &filter.description {
        query.push(" AND description = ").push_bind(description.clone());
    }

    query.push(" ORDER BY source, domain, ip NULLS LAST");
    query
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn upsert_at(&self, entry: &Entry, seen_at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO entries (key, source, domain, ip, category, description, last)
            VALUES ($1, $2, $3, $4::inet, $5, $6, $7)
            ON CONFLICT (key) DO UPDATE SET
                last = EXCLUDED.last,
                category = EXCLUDED.category,
                description = EXCLUDED.description
            "#,
        )
        .bind(entry.key())
        .bind(&entry.source)
        .bind(&entry.domain)
        .bind(entry.ip.map(|ip| ip.to_string()))
        .bind(&entry.category)
        .bind(&entry.description)
        .bind(seen_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM entries WHERE last < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    fn find(&self, filter: &EntryFilter) -> EntryStream {
        let pool = self.pool.clone();
        let filter = filter.clone();
        let (tx, rx) = mpsc::channel(FIND_BUFFER);

        tokio::spawn(async move {
            let mut query = find_query(&filter);
            let mut rows = query
                .build_query_as::<EntryRow>()
                .fetch(&pool)
                .map_err(StoreError::from);

            while let Some(row) = rows.next().await {
                let item = row.and_then(Entry::try_from);
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        ReceiverStream::new(rx).boxed()
    }

    async fn count_entries(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_sources(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT source) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
