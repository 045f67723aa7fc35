//! One update run
//!
//! A run moves through `Fetching`, `Storing` and `Pruning` and ends `Idle`
//! again, whatever the outcome. Any failing feed or store write aborts the
//! run before pruning, so a partial fetch never deletes rows.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reputile_ingest::{CancelReason, Cancellation, FeedError, FeedItem, FeedRegistry, FetchContext};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{EntryStore, StoreError};

/// What a run is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Storing,
    Pruning,
}

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Feed '{feed}' failed: {error}")]
    Fetch { feed: String, error: FeedError },

    #[error("Update cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("Failed to store entry: {0}")]
    Store(StoreError),

    #[error("Failed to prune stale entries: {0}")]
    Prune(StoreError),
}

impl UpdateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpdateError::Cancelled(_))
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub total: u64,
    pub per_source: BTreeMap<String, u64>,
    pub pruned: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Resets the published phase when a run ends, however it ends
struct IdleOnDrop<'a>(&'a watch::Sender<Phase>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(Phase::Idle);
    }
}

pub struct UpdateOrchestrator {
    registry: Arc<FeedRegistry>,
    store: Arc<dyn EntryStore>,
    client: reqwest::Client,
    prune_max_age: chrono::Duration,
    phase: watch::Sender<Phase>,
}

impl UpdateOrchestrator {
    pub fn new(
        registry: Arc<FeedRegistry>,
        store: Arc<dyn EntryStore>,
        client: reqwest::Client,
        prune_max_age: chrono::Duration,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            registry,
            store,
            client,
            prune_max_age,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: Phase) {
        self.phase.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });
    }

    /// Perform one run under a child of `cancel`
    ///
    /// Callers must not start overlapping runs.
    pub async fn run(&self, cancel: &Cancellation) -> Result<RunStats, UpdateError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let run = cancel.child();
        let _idle = IdleOnDrop(&self.phase);

        info!(%run_id, feeds = self.registry.len(), "Starting update run");
        self.enter(Phase::Fetching);

        let ctx = FetchContext::new(self.client.clone(), run.clone());
        let mut stream = self.registry.run(&ctx);
        let mut per_source: BTreeMap<String, u64> = BTreeMap::new();
        let mut total = 0_u64;

        while let Some(item) = stream.recv().await {
            match item {
                FeedItem::Entry(entry) => {
                    self.enter(Phase::Storing);
                    if let Err(e) = self.store.upsert(&entry).await {
                        error!(%run_id, source = %entry.source, error = %e, "Store write failed, aborting run");
                        run.cancel(CancelReason::Aborted("store write failed".to_string()));
                        return Err(UpdateError::Store(e));
                    }
                    total += 1;
                    *per_source.entry(entry.source).or_default() += 1;
                },
                FeedItem::Error { source, error } => match error {
                    FeedError::Cancelled(reason) => {
                        warn!(%run_id, %source, %reason, "Update run cancelled");
                        return Err(UpdateError::Cancelled(reason));
                    },
                    error => {
                        error!(%run_id, %source, error = %error, "Feed failed, aborting run");
                        run.cancel(CancelReason::Aborted(format!("feed '{}' failed", source)));
                        return Err(UpdateError::Fetch { feed: source, error });
                    },
                },
            }
        }

        // every source may have finished before noticing the signal
        if let Some(reason) = run.reason() {
            warn!(%run_id, %reason, "Update run cancelled");
            return Err(UpdateError::Cancelled(reason));
        }

        self.enter(Phase::Pruning);
        let pruned = match self.store.prune(self.prune_max_age).await {
            Ok(pruned) => pruned,
            Err(e) => {
                error!(%run_id, error = %e, stored = total, "Prune failed");
                return Err(UpdateError::Prune(e));
            },
        };

        let stats = RunStats {
            run_id,
            total,
            per_source,
            pruned,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };

        info!(
            %run_id,
            total = stats.total,
            sources = stats.per_source.len(),
            pruned = stats.pruned,
            elapsed_ms = stats.elapsed_ms,
            "Update run completed"
        );

        Ok(stats)
    }
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("feeds", &self.registry.len())
            .field("prune_max_age", &self.prune_max_age)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
