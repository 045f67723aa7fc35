//! Producers of feed items
//!
//! A [`Source`] starts its work on a spawned task and hands back the receiving
//! end of a bounded channel. The stream ends when the channel closes; a failed
//! source sends exactly one error item first.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::Cancellation;
use crate::error::FeedError;
use crate::reader::{fetch_body, read_rows, Dialect};
use crate::record::{Entry, FeedItem};

/// Capacity of every feed channel; a slow consumer only backs up its own source
pub const FEED_CHANNEL_CAPACITY: usize = 64;

pub type FeedStream = mpsc::Receiver<FeedItem>;

/// Maps one row to an entry; `None` skips the row
pub type Translator = Arc<dyn Fn(&[String]) -> Option<Entry> + Send + Sync>;

/// Shared resources of one fetch run
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub client: Client,
    pub cancel: Cancellation,
}

impl FetchContext {
    pub fn new(client: Client, cancel: Cancellation) -> Self {
        Self { client, cancel }
    }

    /// Same client, different cancellation signal
    pub fn with_cancel(&self, cancel: Cancellation) -> Self {
        Self {
            client: self.client.clone(),
            cancel,
        }
    }
}

pub trait Source: Send + Sync {
    /// Start producing; must be called from within a tokio runtime
    fn run(&self, ctx: &FetchContext) -> FeedStream;
}

/// One URL serving delimited text
#[derive(Clone)]
pub struct DelimitedSource {
    url: String,
    dialect: Dialect,
    translator: Translator,
}

impl DelimitedSource {
    pub fn new<F>(url: impl Into<String>, dialect: Dialect, translator: F) -> Self
    where
        F: Fn(&[String]) -> Option<Entry> + Send + Sync + 'static,
    {
        Self {
            url: url.into(),
            dialect,
            translator: Arc::new(translator),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for DelimitedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelimitedSource")
            .field("url", &self.url)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl Source for DelimitedSource {
    fn run(&self, ctx: &FetchContext) -> FeedStream {
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        tokio::spawn(fetch(self.clone(), ctx.clone(), tx));
        rx
    }
}

enum Stop {
    /// The consumer dropped its receiver
    Closed,
    Failed(FeedError),
}

async fn fetch(source: DelimitedSource, ctx: FetchContext, tx: mpsc::Sender<FeedItem>) {
    let started = Instant::now();
    let mut produced = 0usize;

    let outcome = pump(&source, &ctx, &tx, &mut produced).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => {
            info!(url = %source.url, entries = produced, elapsed_ms, "Fetched feed");
        },
        Err(Stop::Closed) => {
            debug!(url = %source.url, entries = produced, elapsed_ms, "Consumer gone, fetch stopped");
        },
        Err(Stop::Failed(error)) => {
            if error.is_cancelled() {
                info!(url = %source.url, entries = produced, elapsed_ms, reason = %error, "Fetch cancelled");
            } else {
                warn!(url = %source.url, entries = produced, elapsed_ms, error = %error, "Fetch failed");
            }
            let _ = tx.send(FeedItem::error(error)).await;
        },
    }
}

async fn pump(
    source: &DelimitedSource,
    ctx: &FetchContext,
    tx: &mpsc::Sender<FeedItem>,
    produced: &mut usize,
) -> Result<(), Stop> {
    let cancel = &ctx.cancel;

    let body = tokio::select! {
        biased;
        reason = cancel.cancelled() => return Err(Stop::Failed(FeedError::Cancelled(reason))),
        _ = tx.closed() => return Err(Stop::Closed),
        body = fetch_body(&ctx.client, &source.url) => body.map_err(Stop::Failed)?,
    };

    let mut rows = read_rows(body, source.dialect);
    loop {
        let row = tokio::select! {
            biased;
            reason = cancel.cancelled() => return Err(Stop::Failed(FeedError::Cancelled(reason))),
            _ = tx.closed() => return Err(Stop::Closed),
            row = rows.next() => row,
        };

        let Some(row) = row else {
            return Ok(());
        };
        let row = row.map_err(Stop::Failed)?;

        let Some(entry) = (source.translator)(&row) else {
            continue;
        };

        tokio::select! {
            biased;
            reason = cancel.cancelled() => return Err(Stop::Failed(FeedError::Cancelled(reason))),
            sent = tx.send(FeedItem::Entry(entry)) => sent.map_err(|_| Stop::Closed)?,
        }
        *produced += 1;
    }
}
