//! Reputile Server - Main entry point

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reputile_common::logging::{init_logging, LogConfig};
use reputile_ingest::{catalog, CancelReason, Cancellation, FetchConfig};
use tokio::signal;
use tracing::info;

use reputile_server::{
    cache::{CacheBackend, MemoryCache, PgCache, ReadThroughCache},
    config::{Config, StoreBackend},
    create_router, db,
    ingest::{UpdateOrchestrator, UpdateScheduler},
    store::{EntryStore, MemoryEntryStore, PgEntryStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_config = LogConfig::from_env_with_prefix("reputile-server")?;
    let _log_guard = init_logging(&log_config)?;

    info!("Starting Reputile Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let (store, cache): (Arc<dyn EntryStore>, Arc<dyn CacheBackend>) = match config.store {
        StoreBackend::Postgres => {
            let pool = db::create_pool(&config.database).await?;
            db::run_migrations(&pool).await?;
            (Arc::new(PgEntryStore::new(pool.clone())), Arc::new(PgCache::new(pool)))
        },
        StoreBackend::Memory => {
            info!("Using in-memory store, data is lost on restart");
            (Arc::new(MemoryEntryStore::new()), Arc::new(MemoryCache::new()))
        },
    };

    let registry = Arc::new(catalog::default_registry()?);
    info!(feeds = registry.len(), "Feed registry loaded");

    let client = FetchConfig::from_env()?.build_client()?;
    let prune_max_age = config
        .update
        .prune_max_age()
        .context("Prune max age is out of range")?;
    let orchestrator = Arc::new(UpdateOrchestrator::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        client,
        prune_max_age,
    ));
    let scheduler = UpdateScheduler::new(orchestrator).with_run_timeout(config.update.timeout());

    let shutdown = Cancellation::new();
    let scheduler_handle = if config.update.enabled {
        Some(scheduler.start(
            config.update.interval(),
            config.update.initial_delay(),
            shutdown.clone(),
        ))
    } else {
        info!("Scheduled updates are disabled (REPUTILE_UPDATE_ENABLED=false)");
        None
    };

    let state = AppState {
        store,
        cache: ReadThroughCache::new(cache, config.cache.ttl()),
        registry,
        scheduler,
        update_token: config.update.token.clone(),
        shutdown: shutdown.clone(),
    };

    let app = create_router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // in-flight runs observe the signal and stop at their next read
    shutdown.cancel(CancelReason::Shutdown);
    if let Some(handle) = scheduler_handle {
        let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Update scheduler did not stop within {} seconds", grace.as_secs());
        }
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(shutdown: Cancellation) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    shutdown.cancel(CancelReason::Shutdown);
}
