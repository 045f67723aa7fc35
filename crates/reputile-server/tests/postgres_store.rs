//! PostgreSQL store and cache tests
//!
//! Run only when `DATABASE_URL` points at a disposable database; skipped otherwise.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use reputile_ingest::Entry;
use reputile_server::cache::{CacheBackend, PgCache};
use reputile_server::config::Config;
use reputile_server::db;
use reputile_server::store::{EntryFilter, EntryStore, PgEntryStore};
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let mut config = Config::default().database;
    config.url = url;
    config.min_connections = 0;

    let pool = db::create_pool(&config).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    Some(pool)
}

fn entry(source: &str, domain: &str, ip: Option<&str>, category: &str) -> Entry {
    Entry {
        source: source.into(),
        ..Entry::new(category)
            .with_domain(domain)
            .with_ip(ip.and_then(|ip| ip.parse().ok()))
    }
}

async fn cleanup(pool: &PgPool, source: &str) {
    sqlx::query("DELETE FROM entries WHERE source = $1")
        .bind(source)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upsert_refreshes_single_row() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let store = PgEntryStore::new(pool.clone());
    let source = format!("test-{}", Uuid::new_v4());

    let first = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
    let second = Utc.timestamp_opt(1_700_000_600, 0).single().unwrap();

    store.upsert_at(&entry(&source, "x.example", None, "malware"), first).await.unwrap();
    store.upsert_at(&entry(&source, "x.example", None, "phishing"), second).await.unwrap();

    let rows: Vec<Entry> = store
        .find(&EntryFilter::new().with_source(source.clone()))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, "phishing");
    assert_eq!(rows[0].last_seen, Some(second));

    cleanup(&pool, &source).await;
}

#[tokio::test]
async fn test_find_by_network_and_order() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let store = PgEntryStore::new(pool.clone());
    let source = format!("test-{}", Uuid::new_v4());

    store.upsert(&entry(&source, "", Some("10.1.2.3"), "attacker")).await.unwrap();
    store.upsert(&entry(&source, "", Some("192.168.1.1"), "attacker")).await.unwrap();
    store.upsert(&entry(&source, "b.example", None, "malware")).await.unwrap();
    store.upsert(&entry(&source, "a.example", Some("2001:db8::1"), "malware")).await.unwrap();

    let in_net: Vec<Entry> = store
        .find(
            &EntryFilter::new()
                .with_source(source.clone())
                .with_ip("10.0.0.0/8".parse().unwrap()),
        )
        .try_collect()
        .await
        .unwrap();
    assert_eq!(in_net.len(), 1);
    assert_eq!(in_net[0].ip, "10.1.2.3".parse().ok());

    let all: Vec<Entry> = store
        .find(&EntryFilter::new().with_source(source.clone()))
        .try_collect()
        .await
        .unwrap();
    let keys: Vec<String> = all.iter().map(Entry::key).collect();
    assert_eq!(
        keys,
        vec![
            format!("{}||10.1.2.3", source),
            format!("{}||192.168.1.1", source),
            format!("{}|a.example|2001:db8::1", source),
            format!("{}|b.example|", source),
        ]
    );

    cleanup(&pool, &source).await;
}

#[tokio::test]
async fn test_prune_removes_only_stale_rows() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let store = PgEntryStore::new(pool.clone());
    let source = format!("test-{}", Uuid::new_v4());

    let old = Utc.timestamp_opt(946_684_800, 0).single().unwrap();
    let cutoff = Utc.timestamp_opt(946_771_200, 0).single().unwrap();
    store.upsert_at(&entry(&source, "old.example", None, "malware"), old).await.unwrap();
    store.upsert_at(&entry(&source, "edge.example", None, "malware"), cutoff).await.unwrap();

    assert!(store.prune_older_than(cutoff).await.unwrap() >= 1);

    let rows: Vec<Entry> = store
        .find(&EntryFilter::new().with_source(source.clone()))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].domain, "edge.example");

    cleanup(&pool, &source).await;
}

#[tokio::test]
async fn test_cache_values_and_counters() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let cache = PgCache::new(pool);
    let key = format!("test:{}", Uuid::new_v4());

    assert_eq!(cache.get(&key).await.unwrap(), None);
    cache.set(&key, "\"value\"", Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("\"value\""));

    assert_eq!(cache.counter(&key).await.unwrap(), 0);
    assert_eq!(cache.incr(&key).await.unwrap(), 1);
    assert_eq!(cache.incr(&key).await.unwrap(), 2);
    assert_eq!(cache.counter(&key).await.unwrap(), 2);

    cache.set_counter(&key, 10).await.unwrap();
    assert_eq!(cache.counter(&key).await.unwrap(), 10);
}

#[tokio::test]
async fn test_cache_set_purges_expired_values() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let cache = PgCache::new(pool.clone());
    let stale = format!("list:{}", Uuid::new_v4());
    let fresh = format!("list:{}", Uuid::new_v4());

    cache.set(&stale, "\"old\"", Duration::from_millis(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    cache.set(&fresh, "\"new\"", Duration::from_secs(60)).await.unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE key = $1")
        .bind(&stale)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(cache.get(&fresh).await.unwrap().as_deref(), Some("\"new\""));

    assert!(cache.purge_expired().await.is_ok());
}
