//! Scheduled feed updates
//!
//! The [`UpdateOrchestrator`] performs one run: fetch every registered feed,
//! upsert what arrives and prune stale rows. The [`UpdateScheduler`] decides
//! when runs happen and makes sure only one is active at a time.

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{Phase, RunStats, UpdateError, UpdateOrchestrator};
pub use scheduler::{LastRun, TriggerError, UpdateScheduler};
