//! Command and control trackers

use crate::catalog::{domain_column, ip_column};
use crate::combinator::Combined;
use crate::feed::Feed;
use crate::host::{extract_host, parse_ip};
use crate::reader::Dialect;
use crate::record::Entry;
use crate::source::DelimitedSource;

const MALC0DE_DESCRIPTION: &str = "distributed malware in the last 30 days";

pub(super) fn abuse_ch_feed() -> Feed {
    let lists = [
        (
            "https://zeustracker.abuse.ch/blocklist.php?download=baddomains",
            "https://zeustracker.abuse.ch/blocklist.php?download=badips",
            "ZeuS C&C server",
        ),
        (
            "https://feodotracker.abuse.ch/blocklist/?download=domainblocklist",
            "https://feodotracker.abuse.ch/blocklist/?download=badips",
            "Feodo trojan C&C server",
        ),
        (
            "https://ransomwaretracker.abuse.ch/downloads/RW_DOMBL.txt",
            "https://ransomwaretracker.abuse.ch/downloads/RW_IPBL.txt",
            "Ransomware botnet C&C traffic",
        ),
        (
            "https://palevotracker.abuse.ch/blocklists.php?download=domainblocklist",
            "https://palevotracker.abuse.ch/blocklists.php?download=ipblocklist",
            "Palevo botnet C&C traffic",
        ),
    ];

    let mut source = Combined::new();
    for (domains, ips, description) in lists {
        source = source
            .with(DelimitedSource::new(domains, Dialect::csv(), domain_column("malware", description)))
            .with(DelimitedSource::new(ips, Dialect::csv(), ip_column("malware", description)));
    }

    Feed::new("abuse.ch", "abuse.ch - ZeuS, Feodo & Ransomware Tracker", source)
        .with_info_url("https://www.abuse.ch/")
        .with_description(
            "abuse.ch tracks command and control servers for the ZeuS and Feodo trojans and \
             for ransomware, and publishes domain and IP blocklists.",
        )
}

/// `ip,description,...`
pub fn bambenek_row(row: &[String]) -> Option<Entry> {
    let ip = parse_ip(row.first()?)?;
    let description = row.get(1).map(String::as_str).unwrap_or_default();
    Some(Entry::new("malware").with_ip(Some(ip)).with_description(description))
}

pub(super) fn bambenek_feed() -> Feed {
    Feed::new(
        "bambenekconsulting.com",
        "Bambenek Consulting OSINT",
        DelimitedSource::new(
            "http://osint.bambenekconsulting.com/feeds/c2-ipmasterlist.txt",
            Dialect::csv(),
            bambenek_row,
        ),
    )
    .with_info_url("http://www.bambenekconsulting.com/")
    .with_description("Master list of IP addresses of known command and control servers.")
}

/// First column is a URL of a C&C panel
pub fn cybercrime_row(row: &[String]) -> Option<Entry> {
    let host = extract_host(row.first()?)?;
    Some(Entry::new("malware").with_domain(host))
}

pub(super) fn cybercrime_feed() -> Feed {
    Feed::new(
        "cybercrime-tracker.net",
        "CyberCrime Tracker",
        DelimitedSource::new("http://cybercrime-tracker.net/all.php", Dialect::csv(), cybercrime_row),
    )
    .with_info_url("http://cybercrime-tracker.net/")
    .with_description("CyberCrime tracks C&C servers.")
}

/// BIND zone style `zone "evil.example" {...};`, hostname in the second field
pub fn malc0de_boot_row(row: &[String]) -> Option<Entry> {
    let domain = row.get(1)?.trim_matches('"');
    if domain.is_empty() {
        return None;
    }
    Some(
        Entry::new("malware")
            .with_domain(domain)
            .with_description(MALC0DE_DESCRIPTION),
    )
}

pub fn malc0de_ip_row(row: &[String]) -> Option<Entry> {
    let ip = parse_ip(row.first()?)?;
    Some(
        Entry::new("malware")
            .with_ip(Some(ip))
            .with_description(MALC0DE_DESCRIPTION),
    )
}

pub(super) fn malc0de_feed() -> Feed {
    let source = Combined::new()
        .with(DelimitedSource::new(
            "http://malc0de.com/bl/BOOT",
            Dialect::c_style_ssv(),
            malc0de_boot_row,
        ))
        .with(DelimitedSource::new(
            "http://malc0de.com/bl/IP_Blacklist.txt",
            Dialect::c_style_csv(),
            malc0de_ip_row,
        ));

    Feed::new("malc0de.com", "malc0de", source)
        .with_info_url("http://malc0de.com/dashboard/")
        .with_description("Domains and addresses hosting malicious executables during the last 30 days.")
}
