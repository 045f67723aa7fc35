//! Built-in feed definitions
//!
//! Every feed is plain configuration: URLs, a [`Dialect`](crate::Dialect) and
//! a translator that maps one row to an [`Entry`]. Translators are ordinary
//! functions so they can be tested against fixture rows without a network.

mod attackers;
mod hosts;
mod trackers;

pub use attackers::autoshun_row;
pub use hosts::{hosts_file_row, phishtank_row};
pub use trackers::{bambenek_row, cybercrime_row, malc0de_boot_row, malc0de_ip_row};

use crate::error::RegistryError;
use crate::feed::{Feed, FeedRegistry};
use crate::host::parse_ip;
use crate::record::Entry;

/// Registry of every built-in feed
pub fn default_registry() -> Result<FeedRegistry, RegistryError> {
    let mut registry = FeedRegistry::new();

    for feed in feeds() {
        registry.register(feed)?;
    }

    Ok(registry)
}

fn feeds() -> Vec<Feed> {
    vec![
        trackers::abuse_ch_feed(),
        attackers::autoshun_feed(),
        trackers::bambenek_feed(),
        attackers::blocklist_de_feed(),
        attackers::bruteforceblocker_feed(),
        attackers::cinsscore_feed(),
        trackers::cybercrime_feed(),
        attackers::greensnow_feed(),
        hosts::hphosts_feed(),
        trackers::malc0de_feed(),
        attackers::nothink_feed(),
        hosts::phishtank_feed(),
    ]
}

/// Translator for lists whose first column is an address
pub(crate) fn ip_column(
    category: &'static str,
    description: &'static str,
) -> impl Fn(&[String]) -> Option<Entry> + Send + Sync + 'static {
    move |row| {
        let ip = parse_ip(row.first()?)?;
        Some(Entry::new(category).with_ip(Some(ip)).with_description(description))
    }
}

/// Translator for lists whose first column is a hostname
pub(crate) fn domain_column(
    category: &'static str,
    description: &'static str,
) -> impl Fn(&[String]) -> Option<Entry> + Send + Sync + 'static {
    move |row| {
        let domain = row.first()?.trim();
        if domain.is_empty() {
            return None;
        }
        Some(Entry::new(category).with_domain(domain).with_description(description))
    }
}

#[cfg(test)]
pub(crate) fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|field| field.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_unique_keys() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 12);
        assert!(registry.get("abuse.ch").is_some());
        assert!(registry.get("phishtank.com").is_some());
    }

    #[test]
    fn test_every_feed_is_documented() {
        let registry = default_registry().unwrap();
        for feed in registry.iter() {
            assert!(!feed.name.is_empty(), "{} has no name", feed.key);
            assert!(feed.info_url.starts_with("http"), "{} has no info url", feed.key);
        }
    }

    #[test]
    fn test_ip_column_skips_garbage() {
        let translate = ip_column("attacker", "");
        assert_eq!(translate(&row(&["not an ip"])), None);
        assert_eq!(translate(&[]), None);

        let entry = translate(&row(&["10.1.2.3", "ignored"])).unwrap();
        assert_eq!(entry.ip, "10.1.2.3".parse().ok());
        assert_eq!(entry.category, "attacker");
        assert!(entry.domain.is_empty());
    }
}
