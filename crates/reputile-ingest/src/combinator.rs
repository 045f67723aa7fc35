//! Fan-in of many feed streams into one

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::error;

use crate::record::FeedItem;
use crate::source::{FeedStream, FetchContext, Source, FEED_CHANNEL_CAPACITY};

/// Merge `inputs` into one stream that closes after every input has closed
///
/// Items of one input keep their order; there is no order across inputs.
/// Error items are forwarded like data. Dropping the returned receiver stops
/// every forwarder, which in turn drops the inputs.
pub fn merge(inputs: Vec<FeedStream>) -> FeedStream {
    let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
    let mut forwarders = JoinSet::new();

    for input in inputs {
        forwarders.spawn(forward(input, tx.clone()));
    }

    // sole owner of the original sender: the output closes once, after the last forwarder
    tokio::spawn(async move {
        while let Some(joined) = forwarders.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Feed forwarder did not finish");
            }
        }
        drop(tx);
    });

    rx
}

async fn forward(mut input: FeedStream, tx: mpsc::Sender<FeedItem>) {
    loop {
        let item = tokio::select! {
            _ = tx.closed() => break,
            item = input.recv() => item,
        };

        let Some(item) = item else {
            break;
        };

        if tx.send(item).await.is_err() {
            break;
        }
    }
}

/// A source made of several others, e.g. a feed published under many URLs
#[derive(Default)]
pub struct Combined {
    sources: Vec<Box<dyn Source>>,
}

impl Combined {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Source + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<Box<dyn Source>> for Combined {
    fn from_iter<I: IntoIterator<Item = Box<dyn Source>>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().collect(),
        }
    }
}

impl Source for Combined {
    fn run(&self, ctx: &FetchContext) -> FeedStream {
        merge(self.sources.iter().map(|source| source.run(ctx)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancellation;
    use crate::record::Entry;
    use std::time::Duration;

    /// Emits `count` entries, one per millisecond
    struct Counting {
        count: usize,
        tag: &'static str,
    }

    impl Source for Counting {
        fn run(&self, _ctx: &FetchContext) -> FeedStream {
            let (tx, rx) = mpsc::channel(1);
            let (count, tag) = (self.count, self.tag);
            tokio::spawn(async move {
                for i in 0..count {
                    let entry = Entry::new(tag).with_domain(format!("{}-{}.example", tag, i));
                    if tx.send(entry.into()).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            });
            rx
        }
    }

    fn ctx() -> FetchContext {
        FetchContext::new(reqwest::Client::new(), Cancellation::new())
    }

    async fn drain(mut stream: FeedStream) -> Vec<FeedItem> {
        let mut items = Vec::new();
        while let Some(item) = stream.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_merge_yields_sum_and_closes() {
        let combined = Combined::new()
            .with(Counting { count: 3, tag: "a" })
            .with(Counting { count: 5, tag: "b" })
            .with(Counting { count: 0, tag: "c" });

        let items = tokio::time::timeout(Duration::from_secs(5), drain(combined.run(&ctx())))
            .await
            .unwrap();

        assert_eq!(items.len(), 8);
    }

    #[tokio::test]
    async fn test_merge_preserves_per_source_order() {
        let combined = Combined::new()
            .with(Counting { count: 10, tag: "a" })
            .with(Counting { count: 10, tag: "b" });

        let items = drain(combined.run(&ctx())).await;
        let a: Vec<String> = items
            .iter()
            .filter_map(|item| match item {
                FeedItem::Entry(entry) if entry.category == "a" => Some(entry.domain.clone()),
                _ => None,
            })
            .collect();

        let expected: Vec<String> = (0..10).map(|i| format!("a-{}.example", i)).collect();
        assert_eq!(a, expected);
    }

    #[tokio::test]
    async fn test_merge_of_nothing_closes_immediately() {
        let mut stream = merge(Vec::new());
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_output_releases_inputs() {
        let (input_tx, input_rx) = mpsc::channel::<FeedItem>(1);
        let output = merge(vec![input_rx]);
        drop(output);

        tokio::time::timeout(Duration::from_secs(1), input_tx.closed())
            .await
            .unwrap();
    }
}
