//! The normalized reputation record and the items that flow through feeds

use std::fmt::Write as _;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// One row of delimited text, already split into fields
pub type Row = Vec<String>;

/// One observation of a bad domain and/or IP by one feed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Key of the feed that reported it; stamped by [`crate::Feed`]
    pub source: String,
    /// Hostname, empty when not applicable
    pub domain: String,
    pub ip: Option<IpAddr>,
    /// Short tag such as "malware", "phishing" or "attacker"
    pub category: String,
    pub description: String,
    /// Set by the store on upsert, never by a feed
    pub last_seen: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.ip = ip;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// An entry must name at least a domain or an address
    pub fn is_valid(&self) -> bool {
        !self.domain.is_empty() || self.ip.is_some()
    }

    pub fn key(&self) -> String {
        identity_key(&self.source, &self.domain, self.ip)
    }
}

/// `source|domain|ip`, with the address in canonical text form
pub fn identity_key(source: &str, domain: &str, ip: Option<IpAddr>) -> String {
    let mut key = String::with_capacity(source.len() + domain.len() + 42);
    key.push_str(source);
    key.push('|');
    key.push_str(domain);
    key.push('|');
    if let Some(ip) = ip {
        let _ = write!(key, "{}", ip);
    }
    key
}

/// What travels on a feed channel: data, or the terminal error of one stream
#[derive(Debug)]
pub enum FeedItem {
    Entry(Entry),
    Error { source: String, error: FeedError },
}

impl FeedItem {
    /// Error item not yet attributed to a feed
    pub fn error(error: FeedError) -> Self {
        FeedItem::Error {
            source: String::new(),
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FeedItem::Error { .. })
    }
}

impl From<Entry> for FeedItem {
    fn from(entry: Entry) -> Self {
        FeedItem::Entry(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_identity_key_layout() {
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(identity_key("a", "", Some(ip)), "a||1.2.3.4");
        assert_eq!(identity_key("a", "x.example", None), "a|x.example|");
        assert_eq!(identity_key("a", "x.example", Some(ip)), "a|x.example|1.2.3.4");
    }

    #[test]
    fn test_identity_key_uses_canonical_ipv6() {
        let long: IpAddr = "2001:0db8:0000:0000:0000:0000:0000:0001".parse().unwrap();
        assert_eq!(identity_key("s", "", Some(long)), "s||2001:db8::1");
    }

    #[test]
    fn test_key_ignores_payload_and_time() {
        let base = Entry {
            source: "feed".into(),
            domain: "x.example".into(),
            ..Entry::new("malware")
        };
        let changed = Entry {
            category: "phishing".into(),
            description: "something else".into(),
            last_seen: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            ..base.clone()
        };

        assert_eq!(base.key(), changed.key());
    }

    #[test]
    fn test_validity() {
        assert!(!Entry::new("malware").is_valid());
        assert!(Entry::new("malware").with_domain("x.example").is_valid());
        assert!(Entry::new("attacker")
            .with_ip("10.0.0.1".parse().ok())
            .is_valid());
    }
}
