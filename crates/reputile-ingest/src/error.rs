//! Error types for feed fetching and parsing

use thiserror::Error;

use crate::cancel::CancelReason;

pub type Result<T> = std::result::Result<T, FeedError>;

/// Terminal failure of one source stream
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed input: {0}")]
    Parse(#[source] csv_async::Error),

    #[error("reading feed body failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch cancelled: {0}")]
    Cancelled(CancelReason),
}

impl FeedError {
    /// Whether this error is an expected stop rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedError::Cancelled(_))
    }
}

impl From<csv_async::Error> for FeedError {
    fn from(err: csv_async::Error) -> Self {
        // body transport errors arrive wrapped as csv I/O errors
        if !matches!(err.kind(), csv_async::ErrorKind::Io(_)) {
            return FeedError::Parse(err);
        }

        match err.into_kind() {
            csv_async::ErrorKind::Io(io) => FeedError::Io(io),
            kind => FeedError::Io(std::io::Error::other(format!("{:?}", kind))),
        }
    }
}

/// Errors raised while assembling or selecting from a feed registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("feed '{0}' is already registered")]
    DuplicateKey(String),

    #[error("unknown feed '{0}'")]
    UnknownFeed(String),
}
