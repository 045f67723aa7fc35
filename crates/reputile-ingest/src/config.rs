//! HTTP client settings for fetching feeds

use std::time::Duration;

use reputile_common::env;
use reqwest::Client;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("reputile/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Upper bound for one whole download
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Read `REPUTILE_FETCH_TIMEOUT` and `REPUTILE_USER_AGENT`
    pub fn from_env() -> reputile_common::Result<Self> {
        Ok(Self {
            timeout: Duration::from_secs(env::parse_or("REPUTILE_FETCH_TIMEOUT", DEFAULT_FETCH_TIMEOUT_SECS)?),
            user_agent: env::string_or("REPUTILE_USER_AGENT", DEFAULT_USER_AGENT),
            ..Self::default()
        })
    }

    pub fn build_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_carries_version() {
        let config = FetchConfig::default();
        assert!(config.user_agent.starts_with("reputile/"));
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(config.build_client().is_ok());
    }
}
