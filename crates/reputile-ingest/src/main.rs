//! Reputile Ingest - fetch feeds without storing them

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reputile_common::logging::{init_logging, LogConfig, LogLevel};
use reputile_ingest::{catalog, CancelReason, Cancellation, FeedItem, FeedRegistry, FetchConfig, FetchContext};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "reputile-ingest")]
#[command(author, version, about = "Dry-run fetcher for Reputile reputation feeds")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered feeds
    Feeds,

    /// Fetch feeds and write their entries to stdout as CSV
    Fetch {
        /// Feed key to fetch; repeat for several, omit for all
        #[arg(short, long = "feed", value_name = "KEY")]
        feeds: Vec<String>,

        /// Cancel the whole run after this many seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env_with_prefix("reputile-ingest")?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _log_guard = init_logging(&log_config)?;

    let registry = catalog::default_registry()?;

    match cli.command {
        Command::Feeds => {
            list_feeds(&registry)?;
            Ok(ExitCode::SUCCESS)
        },
        Command::Fetch { feeds, timeout } => {
            let failed = fetch(&registry, &feeds, timeout.map(Duration::from_secs)).await?;
            if failed > 0 {
                error!(failed, "Some sources failed");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn list_feeds(registry: &FeedRegistry) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for feed in registry.iter() {
        writeln!(out, "{:<26} {:<45} {}", feed.key, feed.name, feed.info_url)?;
    }
    Ok(())
}

/// Returns the number of sources that ended with an error
async fn fetch(registry: &FeedRegistry, keys: &[String], deadline: Option<Duration>) -> Result<usize> {
    let cancel = Cancellation::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling fetch");
                cancel.cancel(CancelReason::Shutdown);
            }
        }
    });

    if let Some(deadline) = deadline {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            cancel.cancel(CancelReason::Deadline);
        });
    }

    let ctx = FetchContext::new(FetchConfig::from_env()?.build_client()?, cancel);
    let mut stream = if keys.is_empty() {
        registry.run(&ctx)
    } else {
        registry.run_selected(keys, &ctx)?
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(std::io::stdout());

    let mut entries = 0usize;
    let mut failed = 0usize;

    while let Some(item) = stream.recv().await {
        match item {
            FeedItem::Entry(entry) => {
                let ip = entry.ip.map(|ip| ip.to_string()).unwrap_or_default();
                writer.write_record([
                    entry.source.as_str(),
                    entry.domain.as_str(),
                    ip.as_str(),
                    entry.category.as_str(),
                    entry.description.as_str(),
                ])?;
                entries += 1;
            },
            FeedItem::Error { source, error } => {
                if error.is_cancelled() {
                    warn!(source = %source, reason = %error, "Feed cancelled");
                } else {
                    error!(source = %source, error = %error, "Feed failed");
                }
                failed += 1;
            },
        }
    }

    writer.flush()?;
    info!(entries, failed, "Fetch complete");
    Ok(failed)
}
