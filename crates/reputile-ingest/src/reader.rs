//! Streaming reader for delimited feed formats
//!
//! Feeds publish comma, space or tab separated text with either `#` or `/`
//! comment lines. Rows are parsed as bytes arrive; nothing is buffered beyond
//! the current record.

use std::io;

use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::{FeedError, Result};
use crate::record::Row;

/// Stream of parsed rows; ends after the first error
pub type RowStream = BoxStream<'static, Result<Row>>;

/// Delimited text flavour of one feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub comment: Option<u8>,
    pub trim_leading_space: bool,
    /// Allow rows with differing field counts
    pub flexible: bool,
}

impl Dialect {
    const fn preset(delimiter: u8, comment: u8) -> Self {
        Self {
            delimiter,
            comment: Some(comment),
            trim_leading_space: true,
            flexible: true,
        }
    }

    pub const fn csv() -> Self {
        Self::preset(b',', b'#')
    }

    pub const fn ssv() -> Self {
        Self::preset(b' ', b'#')
    }

    pub const fn tsv() -> Self {
        Self::preset(b'\t', b'#')
    }

    pub const fn c_style_csv() -> Self {
        Self::preset(b',', b'/')
    }

    pub const fn c_style_ssv() -> Self {
        Self::preset(b' ', b'/')
    }

    fn builder(&self) -> AsyncReaderBuilder {
        let mut builder = AsyncReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .comment(self.comment)
            .flexible(self.flexible)
            .has_headers(false);
        builder
    }

    fn collapses_delimiters(&self) -> bool {
        self.trim_leading_space && self.delimiter.is_ascii_whitespace()
    }

    /// Fields of one record, or `None` for a blank line
    fn row(&self, record: &StringRecord) -> Option<Row> {
        let collapse = self.collapses_delimiters();
        let row: Row = record
            .iter()
            .map(|field| {
                if self.trim_leading_space {
                    field.trim_start()
                } else {
                    field
                }
            })
            .filter(|field| !(collapse && field.is_empty()))
            .map(String::from)
            .collect();

        if row.iter().all(|field| field.is_empty()) {
            None
        } else {
            Some(row)
        }
    }
}

/// Parse `reader` lazily into rows
pub fn read_rows<R>(reader: R, dialect: Dialect) -> RowStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let reader = dialect.builder().create_reader(reader);

    stream::unfold(Some((reader, StringRecord::new())), move |state| async move {
        let (mut reader, mut record) = state?;
        loop {
            match reader.read_record(&mut record).await {
                Ok(false) => return None,
                Ok(true) => {
                    if let Some(row) = dialect.row(&record) {
                        return Some((Ok(row), Some((reader, record))));
                    }
                },
                Err(e) => return Some((Err(FeedError::from(e)), None)),
            }
        }
    })
    .boxed()
}

/// GET `url` and expose the body as an async reader
pub async fn fetch_body(client: &Client, url: &str) -> Result<impl AsyncRead + Unpin + Send + 'static> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FeedError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes_stream().map_err(io::Error::other);
    Ok(StreamReader::new(Box::pin(body)))
}
