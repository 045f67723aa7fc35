//! HTTP surface
//!
//! # Routes
//!
//! - `GET /health` - store connectivity
//! - `GET /lists/database.txt` - filtered CSV export, cached per query string
//! - `POST /_internal/update` - token-guarded update trigger
//! - `GET /api/v1/feeds` - registered feeds with aggregate counts
//! - `GET /api/v1/search` - lookup by address, network or domain
//! - `GET /api/v1/update` - state of the update scheduler

pub mod feeds;
pub mod health;
pub mod lists;
pub mod search;
pub mod update;

use std::sync::Arc;

use axum::Router;
use reputile_ingest::{Cancellation, FeedRegistry};

use crate::cache::ReadThroughCache;
use crate::ingest::UpdateScheduler;
use crate::store::EntryStore;

/// Counter of served list downloads
pub const DOWNLOADS_KEY: &str = "stats:downloads";

/// Size in bytes of the most recently built list
pub const SIZE_KEY: &str = "stats:size";

/// Shared state for all routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntryStore>,
    pub cache: ReadThroughCache,
    pub registry: Arc<FeedRegistry>,
    pub scheduler: UpdateScheduler,
    /// Secret expected by the update trigger; `None` disables it
    pub update_token: Option<String>,
    /// Runs started over HTTP stop when this is cancelled
    pub shutdown: Cancellation,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/feeds", feeds::feeds_routes())
        .nest("/search", search::search_routes())
        .nest("/update", update::status_routes());

    Router::new()
        .merge(health::health_routes())
        .nest("/lists", lists::lists_routes())
        .nest("/_internal", update::trigger_routes())
        .nest("/api/v1", api)
        .with_state(state)
}
