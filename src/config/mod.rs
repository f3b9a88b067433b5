use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use crate::utils::cron_helper::{parse_schedule, parse_timezone};
use defaults::*;
use duration_serde::duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub web: WebConfig,
}

/// Administrative-division API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Nesting depth requested from upstream (1 = provinces, 3 = down to wards)
    pub depth: u8,
    #[serde(with = "duration")]
    pub timeout: Duration,
    pub user_agent: String,
}

/// How a fetched tree is written to the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Cache and index ward records as well (off by policy)
    pub wards_enabled: bool,
    pub layout: PayloadLayout,
    /// Take the `location:loading` store lock so only one process loads at a time
    pub distributed_lock: bool,
    /// How long a held store lock is honoured before another process may take it over
    #[serde(with = "duration")]
    pub lock_ttl: Duration,
    pub retry: RetryConfig,
}

/// Shape of the JSON stored under each `{level}:code:{code}` key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadLayout {
    /// Each record keeps its nested children (province entries embed their districts)
    #[default]
    Nested,
    /// Each record holds only its own scalar fields; children are reached by code
    Flat,
}

/// Retry policy applied by the loader around the upstream fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "duration")]
    pub initial_delay: Duration,
    #[serde(with = "duration")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six or seven field cron expression (seconds first)
    pub cron: String,
    /// IANA time zone the cron expression is evaluated in
    pub timezone: String,
    #[serde(with = "duration")]
    pub check_interval: Duration,
    /// Fire one load as soon as the process starts
    pub load_on_startup: bool,
    /// Scheduled runs rebuild instead of short-circuiting on the guard
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            depth: DEFAULT_UPSTREAM_DEPTH,
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            wards_enabled: DEFAULT_WARDS_ENABLED,
            layout: PayloadLayout::default(),
            distributed_lock: DEFAULT_DISTRIBUTED_LOCK,
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_RETRY_MAX_DELAY_SECS),
            backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_RETRY_JITTER,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_SCHEDULER_ENABLED,
            cron: DEFAULT_CRON.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            load_on_startup: DEFAULT_LOAD_ON_STARTUP,
            force_refresh: DEFAULT_FORCE_REFRESH,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_WEB_ENABLED,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Read the config file, or write the defaults to it when it does not exist yet
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, at the first scheduled tick or fetch
    pub fn validate(&self) -> AppResult<()> {
        url::Url::parse(&self.upstream.base_url).map_err(|e| {
            AppError::configuration(format!(
                "upstream.base_url '{}' is not a valid URL: {e}",
                self.upstream.base_url
            ))
        })?;

        if self.upstream.depth == 0 {
            return Err(AppError::configuration("upstream.depth must be at least 1"));
        }

        if self.loader.retry.max_attempts == 0 {
            return Err(AppError::configuration(
                "loader.retry.max_attempts must be at least 1",
            ));
        }

        if self.loader.retry.backoff_multiplier < 1.0 {
            return Err(AppError::configuration(
                "loader.retry.backoff_multiplier must be >= 1.0",
            ));
        }

        if self.scheduler.enabled {
            parse_schedule(&self.scheduler.cron).map_err(AppError::configuration)?;
            parse_timezone(&self.scheduler.timezone).map_err(AppError::configuration)?;

            if self.scheduler.check_interval.is_zero() {
                return Err(AppError::configuration(
                    "scheduler.check_interval must be greater than zero",
                ));
            }
        }

        Ok(())
    }
}
