//! Feed descriptors and the registry the update run iterates over

use std::fmt;

use tokio::sync::mpsc;
use tracing::warn;

use crate::combinator::merge;
use crate::error::RegistryError;
use crate::record::FeedItem;
use crate::source::{FeedStream, FetchContext, Source, FEED_CHANNEL_CAPACITY};

/// One external reputation feed
pub struct Feed {
    /// Stable identifier, stored as the entry source
    pub key: String,
    pub name: String,
    /// Where humans can read about the feed
    pub info_url: String,
    pub description: String,
    source: Box<dyn Source>,
}

impl Feed {
    pub fn new(key: impl Into<String>, name: impl Into<String>, source: impl Source + 'static) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            info_url: String::new(),
            description: String::new(),
            source: Box::new(source),
        }
    }

    pub fn with_info_url(mut self, url: impl Into<String>) -> Self {
        self.info_url = url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Run the underlying source, attributing everything it yields to this feed
    ///
    /// Domains are lowercased. Entries without domain and address are dropped
    /// here with a warning.
    pub fn run(&self, ctx: &FetchContext) -> FeedStream {
        let mut upstream = self.source.run(ctx);
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let key = self.key.clone();

        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = tx.closed() => break,
                    item = upstream.recv() => item,
                };

                let item = match item {
                    None => break,
                    Some(FeedItem::Entry(mut entry)) => {
                        entry.source.clone_from(&key);
                        entry.last_seen = None;
                        entry.domain.make_ascii_lowercase();
                        if !entry.is_valid() {
                            warn!(source = %key, category = %entry.category, "Dropping entry without domain or ip");
                            continue;
                        }
                        FeedItem::Entry(entry)
                    },
                    Some(FeedItem::Error { error, .. }) => FeedItem::Error {
                        source: key.clone(),
                        error,
                    },
                };

                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        rx
    }
}

impl fmt::Debug for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("info_url", &self.info_url)
            .finish_non_exhaustive()
    }
}

/// Ordered set of feeds with unique keys
///
/// Filled once at startup, then shared read-only.
#[derive(Debug, Default)]
pub struct FeedRegistry {
    feeds: Vec<Feed>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, feed: Feed) -> Result<(), RegistryError> {
        if self.get(&feed.key).is_some() {
            return Err(RegistryError::DuplicateKey(feed.key));
        }
        self.feeds.push(feed);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Feed> {
        self.feeds.iter().find(|feed| feed.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feed> {
        self.feeds.iter()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Run every feed concurrently and merge the results
    pub fn run(&self, ctx: &FetchContext) -> FeedStream {
        merge(self.feeds.iter().map(|feed| feed.run(ctx)).collect())
    }

    /// Run only the feeds named in `keys`
    pub fn run_selected<S: AsRef<str>>(&self, keys: &[S], ctx: &FetchContext) -> Result<FeedStream, RegistryError> {
        let feeds = keys
            .iter()
            .map(|key| {
                self.get(key.as_ref())
                    .ok_or_else(|| RegistryError::UnknownFeed(key.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(merge(feeds.into_iter().map(|feed| feed.run(ctx)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancellation;
    use crate::error::FeedError;
    use crate::record::Entry;
    use chrono::Utc;

    type Make = fn() -> FeedItem;

    /// Replays a fixed list of items
    struct Replay(Vec<Make>);

    impl Source for Replay {
        fn run(&self, _ctx: &FetchContext) -> FeedStream {
            let (tx, rx) = mpsc::channel(4);
            let items: Vec<FeedItem> = self.0.iter().map(|make| make()).collect();
            tokio::spawn(async move {
                for item in items {
                    if tx.send(item).await.is_err() {
                        return;
                    }
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

    fn spoofed() -> FeedItem {
        let mut entry = Entry::new("malware").with_domain("X.Example");
        entry.source = "someone-else".into();
        entry.last_seen = Some(Utc::now());
        entry.into()
    }

    fn empty() -> FeedItem {
        Entry::new("malware").with_description("no target").into()
    }

    fn failure() -> FeedItem {
        FeedItem::error(FeedError::Status {
            url: "http://feed.example/list".into(),
            status: 500,
        })
    }

    #[tokio::test]
    async fn test_feed_stamps_source_and_drops_invalid() {
        let feed = Feed::new("feed-a", "Feed A", Replay(vec![spoofed as Make, empty, failure]));
        let items = drain(feed.run(&ctx())).await;

        assert_eq!(items.len(), 2);
        match &items[0] {
            FeedItem::Entry(entry) => {
                assert_eq!(entry.source, "feed-a");
                assert_eq!(entry.domain, "x.example");
                assert_eq!(entry.last_seen, None);
            },
            other => panic!("expected entry, got {:?}", other),
        }
        match &items[1] {
            FeedItem::Error { source, error } => {
                assert_eq!(source, "feed-a");
                assert!(!error.is_cancelled());
            },
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_rejects_duplicate_keys() {
        let mut registry = FeedRegistry::new();
        registry
            .register(Feed::new("dup", "First", Replay(vec![])))
            .unwrap();

        let err = registry
            .register(Feed::new("dup", "Second", Replay(vec![])))
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateKey("dup".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dup").unwrap().name, "First");
    }

    #[tokio::test]
    async fn test_registry_runs_selected_feeds() {
        let mut registry = FeedRegistry::new();
        registry.register(Feed::new("a", "A", Replay(vec![spoofed as Make]))).unwrap();
        registry.register(Feed::new("b", "B", Replay(vec![spoofed as Make, spoofed]))).unwrap();

        let items = drain(registry.run_selected(&["b"], &ctx()).unwrap()).await;
        assert_eq!(items.len(), 2);

        let all = drain(registry.run(&ctx())).await;
        assert_eq!(all.len(), 3);

        assert!(matches!(
            registry.run_selected(&["nope"], &ctx()),
            Err(RegistryError::UnknownFeed(_))
        ));
    }
}
