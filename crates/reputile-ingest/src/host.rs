//! Helpers for turning feed fields into hosts and addresses

use std::net::IpAddr;

use tracing::debug;
use url::Url;

/// Hostname of a URL or bare `host[:port][/path]` field
///
/// Scheme, port, credentials and path are dropped, as are the brackets around
/// IPv6 literals. Empty fields and `-` give `None`.
pub fn extract_host(field: &str) -> Option<String> {
    let field = field.trim();
    if field.is_empty() || field == "-" {
        return None;
    }

    let lower = field.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        field.to_string()
    } else {
        format!("http://{}", field)
    };

    let url = match Url::parse(&candidate) {
        Ok(url) => url,
        Err(e) => {
            debug!(field = %field, error = %e, "Unparseable host field");
            return None;
        },
    };

    let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Parse an address field, tolerating surrounding whitespace and brackets
pub fn parse_ip(field: &str) -> Option<IpAddr> {
    field
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .ok()
}
