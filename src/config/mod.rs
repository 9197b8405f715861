//! # Poller Configuration
//!
//! Runtime settings are layered with the `config` crate:
//!
//! 1. built-in defaults (see [`crate::constants::defaults`])
//! 2. environment variables prefixed with `DLR_POLLER_` (`DLR_POLLER_WORKERS=20`)
//! 3. command-line flags, passed in as [`ConfigOverrides`]
//!
//! The gateway routing table lives in a separate, Kannel-formatted file and is
//! parsed by [`routing`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use smsc_dlr_poller::config::{ConfigOverrides, PollerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let overrides = ConfigOverrides {
//!     workers: Some(4),
//!     ..Default::default()
//! };
//! let config = PollerConfig::load(&overrides)?;
//! assert_eq!(config.workers, 4);
//! # Ok(())
//! # }
//! ```

pub mod routing;

use crate::constants::defaults;
use crate::error::{PollerError, Result};
use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use routing::{ConnectionProfile, RoutingTable, StorageProfile};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DLR_POLLER";

/// What to do with a record whose gateway has no routing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnroutablePolicy {
    /// Leave the record untouched; it is fetched again next cycle.
    #[default]
    Skip,
    /// Store the failure status without a callback so the record stops cycling.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Kannel configuration holding gateway credentials and storage coordinates
    pub conf: PathBuf,
    /// Worker tasks per cycle
    pub workers: usize,
    /// Maximum records fetched per cycle
    pub limit: i64,
    pub pause_seconds: u64,
    /// Pause after a cycle in which the status API signalled throttling
    pub blocked_pause_seconds: u64,
    pub status_url: String,
    pub http_timeout_seconds: u64,
    /// How long an interrupted poller waits for the running cycle
    pub shutdown_grace_seconds: u64,
    #[serde(default)]
    pub max_db_connections: Option<u32>,
    #[serde(default)]
    pub unroutable_policy: UnroutablePolicy,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Values supplied on the command line; `None` keeps the lower layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub conf: Option<PathBuf>,
    pub workers: Option<usize>,
    pub limit: Option<i64>,
    pub pause_seconds: Option<u64>,
    pub status_url: Option<String>,
    pub shutdown_grace_seconds: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            conf: PathBuf::from(defaults::CONF_PATH),
            workers: defaults::WORKERS,
            limit: defaults::LIMIT,
            pause_seconds: defaults::PAUSE_SECONDS,
            blocked_pause_seconds: defaults::BLOCKED_PAUSE_SECONDS,
            status_url: defaults::STATUS_URL.to_string(),
            http_timeout_seconds: defaults::HTTP_TIMEOUT_SECONDS,
            shutdown_grace_seconds: defaults::SHUTDOWN_GRACE_SECONDS,
            max_db_connections: None,
            unroutable_policy: UnroutablePolicy::Skip,
            log_dir: None,
        }
    }
}

impl PollerConfig {
    /// Load defaults, then `DLR_POLLER_*` variables from the process
    /// environment, then the given overrides.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        Self::load_with_environment(overrides, Environment::with_prefix(ENV_PREFIX))
    }

    /// Same as [`PollerConfig::load`] with an explicit environment source,
    /// which lets tests avoid touching process-wide variables.
    pub fn load_with_environment(
        overrides: &ConfigOverrides,
        environment: Environment,
    ) -> Result<Self> {
        let base = Self::default();

        let settings = Config::builder()
            .set_default("conf", base.conf.display().to_string())?
            .set_default("workers", base.workers as i64)?
            .set_default("limit", base.limit)?
            .set_default("pause_seconds", base.pause_seconds as i64)?
            .set_default("blocked_pause_seconds", base.blocked_pause_seconds as i64)?
            .set_default("status_url", base.status_url.clone())?
            .set_default("http_timeout_seconds", base.http_timeout_seconds as i64)?
            .set_default("shutdown_grace_seconds", base.shutdown_grace_seconds as i64)?
            .set_default("unroutable_policy", "skip")?
            .add_source(environment.try_parsing(true))
            .set_override_option(
                "conf",
                overrides.conf.as_ref().map(|p| p.display().to_string()),
            )?
            .set_override_option("workers", overrides.workers.map(|w| w as i64))?
            .set_override_option("limit", overrides.limit)?
            .set_override_option("pause_seconds", overrides.pause_seconds.map(|p| p as i64))?
            .set_override_option("status_url", overrides.status_url.clone())?
            .set_override_option(
                "shutdown_grace_seconds",
                overrides.shutdown_grace_seconds.map(|s| s as i64),
            )?
            .build()?;

        let config: PollerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PollerError::configuration("workers must be at least 1"));
        }
        if self.limit <= 0 {
            return Err(PollerError::configuration("limit must be positive"));
        }
        if self.http_timeout_seconds == 0 {
            return Err(PollerError::configuration(
                "http_timeout_seconds must be positive",
            ));
        }
        if self.max_db_connections == Some(0) {
            return Err(PollerError::configuration(
                "max_db_connections must be positive",
            ));
        }
        reqwest::Url::parse(&self.status_url).map_err(|e| {
            PollerError::configuration(format!("invalid status_url {}: {e}", self.status_url))
        })?;
        Ok(())
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_seconds)
    }

    pub fn blocked_pause(&self) -> Duration {
        Duration::from_secs(self.blocked_pause_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Pool size for storage; every worker may hold a connection while the
    /// cycle loop streams the batch on another.
    pub fn max_db_connections(&self) -> u32 {
        self.max_db_connections
            .unwrap_or_else(|| u32::try_from(self.workers + 2).unwrap_or(u32::MAX))
    }
}
