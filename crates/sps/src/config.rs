//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::query::list::{MAX_ITEMS_PER_PAGE, PageLimits};
use crate::query::platform::Platform;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL. Only needed to execute queries.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Platform used when a list definition names none (default: postgresql).
    pub platform: Platform,

    /// Page size when a request gives none (default: 50).
    pub items_per_page: u64,

    /// Upper bound for requested page sizes (default: 500).
    pub max_items_per_page: u64,

    /// Per-statement timeout in seconds, 0 to disable (default: 10).
    pub statement_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let platform_name = env::var("SPS_PLATFORM").unwrap_or_else(|_| "postgresql".to_string());
        let platform = Platform::from_name(&platform_name).context("SPS_PLATFORM is invalid")?;

        let items_per_page: u64 = env::var("SPS_ITEMS_PER_PAGE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .context("SPS_ITEMS_PER_PAGE must be a valid u64")?;

        let max_items_per_page: u64 = env::var("SPS_MAX_ITEMS_PER_PAGE")
            .unwrap_or_else(|_| MAX_ITEMS_PER_PAGE.to_string())
            .parse()
            .context("SPS_MAX_ITEMS_PER_PAGE must be a valid u64")?;

        let statement_timeout_secs = env::var("SPS_STATEMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("SPS_STATEMENT_TIMEOUT_SECS must be a valid u64")?;

        if items_per_page == 0 || max_items_per_page == 0 {
            anyhow::bail!("SPS_ITEMS_PER_PAGE and SPS_MAX_ITEMS_PER_PAGE must be at least 1");
        }

        Ok(Self {
            database_url,
            database_max_connections,
            platform,
            items_per_page: items_per_page.min(max_items_per_page),
            max_items_per_page,
            statement_timeout_secs,
        })
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_items_per_page: self.items_per_page,
            max_items_per_page: self.max_items_per_page,
        }
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_secs > 0).then(|| Duration::from_secs(self.statement_timeout_secs))
    }
}
