//! Reputile Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the Reputile workspace members.
//!
//! # Overview
//!
//! - **Error Handling**: the configuration error type shared by every crate
//! - **Environment**: strict helpers for reading typed settings from the environment
//! - **Logging**: `tracing` subscriber setup used by both binaries
//!
//! # Example
//!
//! ```no_run
//! use reputile_common::env;
//!
//! fn interval() -> reputile_common::Result<u64> {
//!     env::parse_or("REPUTILE_UPDATE_INTERVAL", 3600)
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{ReputileError, Result};
