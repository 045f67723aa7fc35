//! CSV rendering of stored entries

use std::collections::HashMap;

use futures::TryStreamExt;
use reputile_ingest::Entry;

use crate::store::{EntryStream, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not valid UTF-8")]
    Encoding,
}

fn record(entry: &Entry) -> [String; 6] {
    [
        entry.source.clone(),
        entry.domain.clone(),
        entry.ip.map(|ip| ip.to_string()).unwrap_or_default(),
        entry
            .last_seen
            .map(|last| last.timestamp().to_string())
            .unwrap_or_default(),
        entry.category.clone(),
        entry.description.clone(),
    ]
}

/// Render `entries` as headerless CSV: source, domain, ip, last seen (unix
/// seconds), category, description
///
/// The first stream error aborts the export.
pub async fn write_csv(mut entries: EntryStream) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    while let Some(entry) = entries.try_next().await? {
        writer.write_record(record(&entry))?;
    }

    let bytes = writer.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|_| ExportError::Encoding)
}

/// First value of every query parameter
pub fn first_values(raw_query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use futures::stream::{self, StreamExt};

    fn entry(domain: &str, ip: Option<&str>, description: &str) -> Entry {
        Entry {
            source: "feed".into(),
            domain: domain.into(),
            ip: ip.and_then(|ip| ip.parse().ok()),
            category: "malware".into(),
            description: description.into(),
            last_seen: Utc.timestamp_opt(1_700_000_000, 0).single(),
        }
    }

    #[tokio::test]
    async fn test_columns_and_quoting() {
        let rows: Vec<Result<Entry, StoreError>> = vec![
            Ok(entry("x.example", None, "")),
            Ok(entry("", Some("1.2.3.4"), "C2, \"botnet\"")),
        ];

        let csv = write_csv(stream::iter(rows).boxed()).await.unwrap();
        assert_eq!(
            csv,
            "feed,x.example,,1700000000,malware,\n\
             feed,,1.2.3.4,1700000000,malware,\"C2, \"\"botnet\"\"\"\n"
        );
    }

    #[tokio::test]
    async fn test_empty_stream_is_empty_body() {
        let csv = write_csv(stream::empty::<Result<Entry, StoreError>>().boxed()).await.unwrap();
        assert!(csv.is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_aborts() {
        let rows = vec![
            Ok(entry("x.example", None, "")),
            Err(StoreError::InvalidRow("broken".into())),
            Ok(entry("y.example", None, "")),
        ];

        let err = write_csv(stream::iter(rows).boxed()).await.unwrap_err();
        assert!(matches!(err, ExportError::Store(StoreError::InvalidRow(_))));
    }

    #[test]
    fn test_first_values() {
        let params = first_values("category=malware&source=a&category=phishing&ip=10.0.0.0%2F8");
        assert_eq!(params.get("category").map(String::as_str), Some("malware"));
        assert_eq!(params.get("ip").map(String::as_str), Some("10.0.0.0/8"));
        assert_eq!(params.len(), 3);
    }
}
