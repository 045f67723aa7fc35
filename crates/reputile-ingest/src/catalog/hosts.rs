//! Hostname lists: hosts files and phishing URLs

use crate::combinator::Combined;
use crate::feed::Feed;
use crate::host::extract_host;
use crate::reader::Dialect;
use crate::record::Entry;
use crate::source::DelimitedSource;

/// `127.0.0.1 hostname` line of a hosts file
pub fn hosts_file_row(row: &[String], category: &str, description: &str) -> Option<Entry> {
    let domain = row.get(1)?;
    if domain == "localhost" {
        return None;
    }

    Some(Entry::new(category).with_domain(domain.as_str()).with_description(description))
}

fn hosts_file(url: &str, category: &'static str, description: &'static str) -> DelimitedSource {
    DelimitedSource::new(url, Dialect::ssv(), move |row: &[String]| {
        hosts_file_row(row, category, description)
    })
}

pub(super) fn hphosts_feed() -> Feed {
    let source = Combined::new()
        .with(hosts_file(
            "http://hosts-file.net/emd.txt",
            "malware",
            "engaged in malware distribution",
        ))
        .with(hosts_file(
            "http://hosts-file.net/exp.txt",
            "malware",
            "engaged in the housing, development or distribution of exploits",
        ))
        .with(hosts_file("http://hosts-file.net/psh.txt", "phishing", "engaged in phishing"));

    Feed::new("hosts-file.net", "hpHosts", source)
        .with_info_url("http://hosts-file.net/")
        .with_description("Community maintained hosts file blocking ad, tracking and malicious websites.")
}

/// `phish_id,url,phish_detail_url,...`; the header line is skipped
pub fn phishtank_row(row: &[String]) -> Option<Entry> {
    if row.first()? == "phish_id" {
        return None;
    }

    let domain = extract_host(row.get(1)?)?;
    Some(
        Entry::new("phishing")
            .with_domain(domain)
            .with_description("Domain hosts web pages used for phishing"),
    )
}

pub(super) fn phishtank_feed() -> Feed {
    Feed::new(
        "phishtank.com",
        "PhishTank",
        DelimitedSource::new("http://data.phishtank.com/data/online-valid.csv", Dialect::csv(), phishtank_row),
    )
    .with_info_url("http://www.phishtank.com/")
    .with_description("Community verified phishing sites.")
}
