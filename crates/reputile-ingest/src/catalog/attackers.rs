//! Address lists of hosts seen attacking honeypots and sensors

use crate::catalog::ip_column;
use crate::combinator::Combined;
use crate::feed::Feed;
use crate::host::parse_ip;
use crate::reader::Dialect;
use crate::record::Entry;
use crate::source::DelimitedSource;

/// `ip,timestamp,description`
pub fn autoshun_row(row: &[String]) -> Option<Entry> {
    if row.len() < 3 {
        return None;
    }

    let ip = parse_ip(&row[0])?;
    Some(
        Entry::new("attacker")
            .with_ip(Some(ip))
            .with_description(row[2].as_str()),
    )
}

pub(super) fn autoshun_feed() -> Feed {
    Feed::new(
        "autoshun.org",
        "AutoShun",
        DelimitedSource::new("https://www.autoshun.org/files/shunlist.csv", Dialect::csv(), autoshun_row),
    )
    .with_info_url("https://www.autoshun.org/")
    .with_description(
        "AutoShun correlates Snort sensor logs with honeypots and mail filters from around the world.",
    )
}

pub(super) fn blocklist_de_feed() -> Feed {
    Feed::new(
        "blocklist.de",
        "blocklist.de",
        DelimitedSource::new(
            "http://lists.blocklist.de/lists/all.txt",
            Dialect::csv(),
            ip_column("attacker", ""),
        ),
    )
    .with_info_url("http://www.blocklist.de/en/index.html")
    .with_description("Addresses that attacked SSH, mail, FTP, web and other services in the last 48 hours.")
}

pub(super) fn bruteforceblocker_feed() -> Feed {
    Feed::new(
        "rulez.sk",
        "BruteForceBlocker",
        DelimitedSource::new(
            "http://danger.rulez.sk/projects/bruteforceblocker/blist.php",
            Dialect::tsv(),
            ip_column("attacker", ""),
        ),
    )
    .with_info_url("http://danger.rulez.sk/index.php/bruteforceblocker/")
    .with_description("Addresses blocked for SSH brute force attempts.")
}

pub(super) fn cinsscore_feed() -> Feed {
    Feed::new(
        "cinsscore.com",
        "CI Army List",
        DelimitedSource::new("http://cinsscore.com/list/ci-badguys.txt", Dialect::csv(), ip_column("malware", "")),
    )
    .with_info_url("http://cinsscore.com/")
    .with_description(
        "Addresses with a very poor Rogue Packet score that are not yet widely identified as malicious.",
    )
}

pub(super) fn greensnow_feed() -> Feed {
    Feed::new(
        "greensnow.co",
        "GreenSnow",
        DelimitedSource::new(
            "http://blocklist.greensnow.co/greensnow.txt",
            Dialect::csv(),
            ip_column("attacker", ""),
        ),
    )
    .with_info_url("https://greensnow.co/")
    .with_description("Addresses harvested from attacks of any kind except spam.")
}

pub(super) fn nothink_feed() -> Feed {
    let source = Combined::new()
        .with(DelimitedSource::new(
            "http://www.nothink.org/blacklist/blacklist_snmp_week.txt",
            Dialect::csv(),
            ip_column("attacker", "SNMP attackers"),
        ))
        .with(DelimitedSource::new(
            "http://www.nothink.org/blacklist/blacklist_ssh_week.txt",
            Dialect::csv(),
            ip_column("attacker", "SSH attackers"),
        ))
        .with(DelimitedSource::new(
            "http://www.nothink.org/blacklist/blacklist_telnet_week.txt",
            Dialect::csv(),
            ip_column("attacker", "Telnet attackers"),
        ));

    Feed::new("nothink.org", "nothink.org", source)
        .with_info_url("http://www.nothink.org/index.php")
        .with_description("Honeypots detecting SNMP, SSH and telnet attacks.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::row;

    #[test]
    fn test_autoshun_row() {
        let entry = autoshun_row(&row(&["1.2.3.4", "2026-10-15 10:00:00", "Tor Exit Node"])).unwrap();
        assert_eq!(entry.ip, "1.2.3.4".parse().ok());
        assert_eq!(entry.category, "attacker");
        assert_eq!(entry.description, "Tor Exit Node");
    }

    #[test]
    fn test_autoshun_row_short_or_header() {
        assert_eq!(autoshun_row(&row(&["1.2.3.4", "2026-10-15"])), None);
        assert_eq!(autoshun_row(&row(&["Shunlist as of", "x", "y"])), None);
    }
}
