//! Configuration management

use std::time::Duration;

use reputile_common::env;
use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/reputile";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Update Configuration Constants
// ============================================================================

/// Time between two scheduled update runs (1 hour).
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 3600;

/// Delay before the first scheduled run after startup.
pub const DEFAULT_UPDATE_INITIAL_DELAY_SECS: u64 = 5;

/// Entries not refreshed for this many days are pruned.
pub const DEFAULT_PRUNE_MAX_AGE_DAYS: u64 = 7;

/// Upper bound for the prune window (100 years).
pub const MAX_PRUNE_MAX_AGE_DAYS: u64 = 36_500;

/// Lifetime of cached aggregate reads (1 hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Upper bound for the cache lifetime (1 year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 3600;

/// Default CORS allowed origin.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub update: UpdateConfig,
    pub cache: CacheConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Where entries, cached values and counters live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Process-local; everything is lost on restart
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("unknown store backend '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Run updates on a timer
    pub enabled: bool,
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    /// Deadline for one run; `None` lets runs take as long as they need
    pub timeout_secs: Option<u64>,
    /// Secret for `POST /_internal/update`; the trigger is disabled without it
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub prune_max_age_days: u64,
}

impl UpdateConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// `None` when the configured window is not representable
    pub fn prune_max_age(&self) -> Option<chrono::Duration> {
        i64::try_from(self.prune_max_age_days)
            .ok()
            .and_then(chrono::Duration::try_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Read every setting from the environment without validating
    pub fn from_env() -> reputile_common::Result<Self> {
        Ok(Config {
            server: ServerConfig {
                host: env::string_or("REPUTILE_HOST", DEFAULT_SERVER_HOST),
                port: env::parse_or("REPUTILE_PORT", DEFAULT_SERVER_PORT)?,
                shutdown_timeout_secs: env::parse_or(
                    "REPUTILE_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                )?,
            },
            store: env::parse_or("REPUTILE_STORE", StoreBackend::default())?,
            database: DatabaseConfig {
                url: env::string_or("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env::parse_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
                min_connections: env::parse_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                )?,
                connect_timeout_secs: env::parse_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?,
                idle_timeout_secs: env::parse_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                )?,
            },
            update: UpdateConfig {
                enabled: env::flag_or("REPUTILE_UPDATE_ENABLED", true)?,
                interval_secs: env::parse_or("REPUTILE_UPDATE_INTERVAL", DEFAULT_UPDATE_INTERVAL_SECS)?,
                initial_delay_secs: env::parse_or(
                    "REPUTILE_UPDATE_INITIAL_DELAY",
                    DEFAULT_UPDATE_INITIAL_DELAY_SECS,
                )?,
                timeout_secs: env::parse("REPUTILE_UPDATE_TIMEOUT")?,
                token: env::string("REPUTILE_UPDATE_TOKEN"),
                prune_max_age_days: env::parse_or(
                    "REPUTILE_PRUNE_MAX_AGE_DAYS",
                    DEFAULT_PRUNE_MAX_AGE_DAYS,
                )?,
            },
            cache: CacheConfig {
                ttl_secs: env::parse_or("REPUTILE_CACHE_TTL", DEFAULT_CACHE_TTL_SECS)?,
            },
            cors: CorsConfig {
                allowed_origins: env::list_or("CORS_ALLOWED_ORIGINS", &[DEFAULT_CORS_ALLOWED_ORIGIN]),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.store == StoreBackend::Postgres {
            if self.database.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }

            if self.database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }

            if self.database.min_connections > self.database.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    self.database.min_connections,
                    self.database.max_connections
                );
            }
        }

        if self.update.interval_secs == 0 {
            anyhow::bail!("Update interval must be greater than 0");
        }

        if self.update.timeout_secs == Some(0) {
            anyhow::bail!("Update timeout must be greater than 0 when set");
        }

        if self.update.prune_max_age_days == 0 {
            anyhow::bail!("Prune max age must be at least one day");
        }

        if self.update.prune_max_age_days > MAX_PRUNE_MAX_AGE_DAYS {
            anyhow::bail!(
                "Prune max age ({} days) cannot exceed {} days",
                self.update.prune_max_age_days,
                MAX_PRUNE_MAX_AGE_DAYS
            );
        }

        if self.cache.ttl_secs == 0 {
            anyhow::bail!("Cache TTL must be greater than 0");
        }

        if self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            anyhow::bail!(
                "Cache TTL ({}s) cannot exceed {}s",
                self.cache.ttl_secs,
                MAX_CACHE_TTL_SECS
            );
        }

        if self.update.token.is_none() {
            tracing::warn!("REPUTILE_UPDATE_TOKEN is not set - the HTTP update trigger is disabled");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            store: StoreBackend::default(),
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            update: UpdateConfig {
                enabled: true,
                interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
                initial_delay_secs: DEFAULT_UPDATE_INITIAL_DELAY_SECS,
                timeout_secs: None,
                token: None,
                prune_max_age_days: DEFAULT_PRUNE_MAX_AGE_DAYS,
            },
            cache: CacheConfig {
                ttl_secs: DEFAULT_CACHE_TTL_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            },
        }
    }
}
