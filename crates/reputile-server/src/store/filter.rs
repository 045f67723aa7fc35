use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use reputile_ingest::Entry;

use super::net::IpNet;
use super::{StoreError, StoreResult};

/// Query keys understood by [`EntryFilter::from_map`]; anything else is ignored
pub const FILTER_KEYS: &[&str] = &["source", "domain", "ip", "last", "category", "description"];

/// Conjunction of optional exact-match and range conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub source: Option<String>,
    pub domain: Option<String>,
    /// Stored address must lie inside this network
    pub ip: Option<IpNet>,
    /// Last seen strictly after this instant
    pub last_after: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(params: &HashMap<String, String>) -> StoreResult<Self> {
        let mut filter = Self::default();

        for (key, value) in params {
            let invalid = || StoreError::InvalidFilter {
                key: key.clone(),
                value: value.clone(),
            };

            match key.as_str() {
                "source" => filter.source = Some(value.clone()),
                "domain" => filter = filter.with_domain(value.as_str()),
                "category" => filter.category = Some(value.clone()),
                "description" => filter.description = Some(value.clone()),
                "ip" => filter.ip = Some(value.parse().map_err(|_| invalid())?),
                "last" => filter.last_after = Some(parse_time(value).ok_or_else(invalid)?),
                _ => {},
            }
        }

        Ok(filter)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Stored domains are lowercase, so the wanted domain is too
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let mut domain = domain.into();
        domain.make_ascii_lowercase();
        self.domain = Some(domain);
        self
    }

    pub fn with_ip(mut self, net: IpNet) -> Self {
        self.ip = Some(net);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn seen_after(mut self, instant: DateTime<Utc>) -> Self {
        self.last_after = Some(instant);
        self
    }

    /// Evaluate the filter against a stored entry
    pub fn matches(&self, entry: &Entry) -> bool {
        fn exact(wanted: &Option<String>, actual: &str) -> bool {
            wanted.as_deref().map_or(true, |wanted| wanted == actual)
        }

        exact(&self.source, &entry.source)
            && exact(&self.domain, &entry.domain)
            && exact(&self.category, &entry.category)
            && exact(&self.description, &entry.description)
            && self
                .ip
                .map_or(true, |net| entry.ip.is_some_and(|ip| net.contains(&ip)))
            && self
                .last_after
                .map_or(true, |after| entry.last_seen.is_some_and(|last| last > after))
    }
}

/// Unix seconds or RFC 3339
fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn entry() -> Entry {
        Entry {
            source: "feed".into(),
            domain: "x.example".into(),
            ip: "10.0.0.7".parse().ok(),
            category: "malware".into(),
            description: "".into(),
            last_seen: Utc.timestamp_opt(1_700_000_100, 0).single(),
        }
    }

    #[test]
    fn test_from_map_ignores_unknown_keys() {
        let filter = EntryFilter::from_map(&params(&[("category", "malware"), ("order", "desc")])).unwrap();
        assert_eq!(filter, EntryFilter::new().with_category("malware"));
    }

    #[test]
    fn test_domain_is_matched_in_lowercase() {
        let filter = EntryFilter::from_map(&params(&[("domain", "X.Example")])).unwrap();
        assert_eq!(filter.domain.as_deref(), Some("x.example"));
        assert!(filter.matches(&entry()));
    }

    #[test]
    fn test_from_map_parses_ip_and_time() {
        let filter = EntryFilter::from_map(&params(&[("ip", "10.0.0.0/8"), ("last", "1700000000")])).unwrap();
        assert_eq!(filter.ip.unwrap().to_string(), "10.0.0.0/8");
        assert_eq!(filter.last_after, Utc.timestamp_opt(1_700_000_000, 0).single());

        let rfc = EntryFilter::from_map(&params(&[("last", "2023-11-14T22:13:20Z")])).unwrap();
        assert_eq!(rfc.last_after, filter.last_after);
    }

    #[test]
    fn test_from_map_rejects_malformed_values() {
        let err = EntryFilter::from_map(&params(&[("ip", "not-an-ip")])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilter { ref key, .. } if key == "ip"));

        assert!(EntryFilter::from_map(&params(&[("last", "yesterday")])).is_err());
    }

    #[test]
    fn test_matches() {
        let entry = entry();
        assert!(EntryFilter::new().matches(&entry));
        assert!(EntryFilter::new().with_source("feed").with_category("malware").matches(&entry));
        assert!(!EntryFilter::new().with_category("phishing").matches(&entry));
        assert!(EntryFilter::new().with_ip("10.0.0.0/24".parse().unwrap()).matches(&entry));
        assert!(!EntryFilter::new().with_ip("10.0.1.0/24".parse().unwrap()).matches(&entry));
    }

    #[test]
    fn test_last_is_strictly_after() {
        let entry = entry();
        let at = entry.last_seen.unwrap();

        assert!(!EntryFilter::new().seen_after(at).matches(&entry));
        assert!(EntryFilter::new()
            .seen_after(at - chrono::Duration::seconds(1))
            .matches(&entry));
    }
}
