//! Reputile Server Library
//!
//! HTTP server that aggregates third-party reputation feeds into one store.
//!
//! # Overview
//!
//! - **Store**: entries keyed by `source|domain|ip`, in PostgreSQL or in memory
//! - **Updates**: a scheduler runs every registered feed, upserts the results
//!   and prunes rows that were not refreshed for a week
//! - **Cache**: aggregate reads and CSV lists are served through a read-through
//!   cache with a fixed TTL
//! - **API**: feed listing, search, CSV export and a token-guarded update trigger
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reputile_server::store::{EntryFilter, EntryStore, MemoryEntryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryEntryStore::new());
//!     let csv = reputile_server::export::write_csv(store.find(&EntryFilter::new())).await?;
//!     print!("{}", csv);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod store;

use axum::Router;
use tower_http::compression::CompressionLayer;

pub use error::AppError;
pub use features::AppState;

/// Application router with the full middleware stack
pub fn create_router(state: AppState, cors: &config::CorsConfig) -> Router {
    features::router(state)
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}
