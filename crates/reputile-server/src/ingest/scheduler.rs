//! When update runs happen
//!
//! Runs are started by a timer and on demand. A mutex held for the whole run
//! keeps them from overlapping; a trigger that finds it taken is refused
//! instead of queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reputile_ingest::{CancelReason, Cancellation};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::orchestrator::{Phase, RunStats, UpdateError, UpdateOrchestrator};

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("An update run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Update(#[from] UpdateError),
}

/// Outcome of the most recent finished run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LastRun {
    Succeeded {
        finished_at: DateTime<Utc>,
        #[serde(flatten)]
        stats: RunStats,
    },
    Failed {
        finished_at: DateTime<Utc>,
        error: String,
        cancelled: bool,
    },
}

#[derive(Clone)]
pub struct UpdateScheduler {
    orchestrator: Arc<UpdateOrchestrator>,
    running: Arc<Mutex<()>>,
    last: Arc<RwLock<Option<LastRun>>>,
    run_timeout: Option<Duration>,
}

impl UpdateScheduler {
    pub fn new(orchestrator: Arc<UpdateOrchestrator>) -> Self {
        Self {
            orchestrator,
            running: Arc::new(Mutex::new(())),
            last: Arc::new(RwLock::new(None)),
            run_timeout: None,
        }
    }

    /// Cancel runs that take longer than `timeout` with [`CancelReason::Deadline`]
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub async fn last_run(&self) -> Option<LastRun> {
        self.last.read().await.clone()
    }

    fn acquire(&self) -> Result<OwnedMutexGuard<()>, TriggerError> {
        Arc::clone(&self.running)
            .try_lock_owned()
            .map_err(|_| TriggerError::AlreadyRunning)
    }

    /// Run once now, unless a run is already active
    pub async fn try_run(&self, cancel: &Cancellation) -> Result<RunStats, TriggerError> {
        let guard = self.acquire()?;
        self.run_locked(guard, cancel).await
    }

    /// Start a run in the background; refuses immediately when one is active
    pub fn dispatch(&self, cancel: Cancellation) -> Result<JoinHandle<()>, TriggerError> {
        let guard = self.acquire()?;
        let this = self.clone();

        Ok(tokio::spawn(async move {
            if let Err(e) = this.run_locked(guard, &cancel).await {
                log_failure(&e);
            }
        }))
    }

    async fn run_locked(
        &self,
        _guard: OwnedMutexGuard<()>,
        cancel: &Cancellation,
    ) -> Result<RunStats, TriggerError> {
        let scope = cancel.child();
        let run = self.orchestrator.run(&scope);
        tokio::pin!(run);

        let outcome = match self.run_timeout {
            None => run.await,
            Some(limit) => {
                tokio::select! {
                    biased;
                    outcome = &mut run => outcome,
                    _ = tokio::time::sleep(limit) => {
                        warn!(timeout_secs = limit.as_secs(), "Update run exceeded its deadline");
                        scope.cancel(CancelReason::Deadline);
                        run.await
                    },
                }
            },
        };

        let finished_at = Utc::now();
        let last = match &outcome {
            Ok(stats) => LastRun::Succeeded {
                finished_at,
                stats: stats.clone(),
            },
            Err(e) => LastRun::Failed {
                finished_at,
                error: e.to_string(),
                cancelled: e.is_cancelled(),
            },
        };
        *self.last.write().await = Some(last);

        Ok(outcome?)
    }

    /// Run on a timer until `shutdown` is cancelled
    pub fn start(&self, interval: Duration, initial_delay: Duration, shutdown: Cancellation) -> JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                initial_delay_secs = initial_delay.as_secs(),
                "Update scheduler started"
            );

            let mut wait = initial_delay;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {},
                }

                match this.try_run(&shutdown).await {
                    Ok(_) => {},
                    Err(TriggerError::AlreadyRunning) => {
                        info!("Skipping scheduled update, a run is already in progress");
                    },
                    Err(e) => log_failure(&e),
                }

                if shutdown.is_cancelled() {
                    break;
                }
                wait = interval;
            }

            info!("Update scheduler stopped");
        })
    }
}

fn log_failure(e: &TriggerError) {
    match e {
        TriggerError::Update(update) if update.is_cancelled() => {
            info!(reason = %update, "Update run stopped");
        },
        other => error!(error = %other, "Update run failed"),
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("orchestrator", &self.orchestrator)
            .field("run_timeout", &self.run_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::orchestrator::tests::{registry_of, scenario_registry, Stalled};
    use crate::store::{EntryStore, MemoryEntryStore};
    use reputile_ingest::{Feed, FeedRegistry};

    fn scheduler(registry: Arc<FeedRegistry>, store: Arc<MemoryEntryStore>) -> UpdateScheduler {
        UpdateScheduler::new(Arc::new(UpdateOrchestrator::new(
            registry,
            store,
            reqwest::Client::new(),
            chrono::Duration::days(7),
        )))
    }

    #[tokio::test]
    async fn test_try_run_records_outcome() {
        let store = Arc::new(MemoryEntryStore::new());
        let scheduler = scheduler(scenario_registry(), store.clone());
        assert!(scheduler.last_run().await.is_none());

        let stats = scheduler.try_run(&Cancellation::new()).await.unwrap();
        assert_eq!(stats.total, 2);
        assert!(matches!(scheduler.last_run().await, Some(LastRun::Succeeded { .. })));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_second_trigger_is_refused_while_running() {
        let registry = registry_of(vec![Feed::new("slow", "Slow", Stalled)]);
        let scheduler = scheduler(registry, Arc::new(MemoryEntryStore::new()));
        let shutdown = Cancellation::new();

        let handle = scheduler.dispatch(shutdown.clone()).unwrap();
        assert!(scheduler.is_running());

        assert!(matches!(
            scheduler.try_run(&shutdown).await,
            Err(TriggerError::AlreadyRunning)
        ));
        assert!(matches!(
            scheduler.dispatch(shutdown.clone()),
            Err(TriggerError::AlreadyRunning)
        ));

        shutdown.cancel(CancelReason::Shutdown);
        handle.await.unwrap();

        match scheduler.last_run().await {
            Some(LastRun::Failed { cancelled, .. }) => assert!(cancelled),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_run() {
        let registry = registry_of(vec![Feed::new("slow", "Slow", Stalled)]);
        let scheduler = scheduler(registry, Arc::new(MemoryEntryStore::new()))
            .with_run_timeout(Some(Duration::from_secs(30)));

        let err = scheduler.try_run(&Cancellation::new()).await.unwrap_err();
        assert!(matches!(
            err,
            TriggerError::Update(UpdateError::Cancelled(CancelReason::Deadline))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_loop_runs_and_stops_on_shutdown() {
        let store = Arc::new(MemoryEntryStore::new());
        let scheduler = scheduler(scenario_registry(), store.clone());
        let shutdown = Cancellation::new();

        let handle = scheduler.start(Duration::from_secs(3600), Duration::from_secs(5), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(6)).await;
        while scheduler.last_run().await.is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.count_entries().await.unwrap(), 2);

        shutdown.cancel(CancelReason::Shutdown);
        handle.await.unwrap();
    }
}
