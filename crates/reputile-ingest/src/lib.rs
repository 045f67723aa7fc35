//! Reputile Ingest Library
//!
//! Fetching and normalizing third-party reputation feeds.
//!
//! # Pipeline
//!
//! - **Reader**: streams rows out of comma, space or tab separated bodies
//! - **Sources**: fetch one URL (or several, combined) and translate rows to entries
//! - **Feeds**: stamp entries with the feed key and drop invalid ones
//! - **Combinator**: merges any number of feed streams into one
//! - **Cancellation**: stops every in-flight fetch of a run
//!
//! # Example
//!
//! ```no_run
//! use reputile_ingest::{catalog, Cancellation, FeedItem, FetchConfig, FetchContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = catalog::default_registry()?;
//!     let ctx = FetchContext::new(FetchConfig::default().build_client()?, Cancellation::new());
//!
//!     let mut stream = registry.run(&ctx);
//!     while let Some(item) = stream.recv().await {
//!         if let FeedItem::Entry(entry) = item {
//!             println!("{}", entry.key());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod catalog;
pub mod combinator;
pub mod config;
pub mod error;
pub mod feed;
pub mod host;
pub mod reader;
pub mod record;
pub mod source;

pub use cancel::{CancelReason, Cancellation};
pub use combinator::{merge, Combined};
pub use config::FetchConfig;
pub use error::{FeedError, RegistryError};
pub use feed::{Feed, FeedRegistry};
pub use reader::{read_rows, Dialect};
pub use record::{identity_key, Entry, FeedItem, Row};
pub use source::{DelimitedSource, FeedStream, FetchContext, Source, Translator};
