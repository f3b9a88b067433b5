//! Configuration default values
//!
//! All default values for configuration options live here so they can be
//! changed in one place.

// Upstream defaults
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://provinces.open-api.vn/api/";
pub const DEFAULT_UPSTREAM_DEPTH: u8 = 3;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "location-cache/0.1";

// Loader defaults
pub const DEFAULT_WARDS_ENABLED: bool = false;
pub const DEFAULT_DISTRIBUTED_LOCK: bool = true;
pub const DEFAULT_LOCK_TTL_SECS: u64 = 600;

// Retry defaults
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 10;
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_JITTER: bool = true;

// Scheduler defaults (daily, off-peak, local time)
pub const DEFAULT_SCHEDULER_ENABLED: bool = true;
pub const DEFAULT_CRON: &str = "0 0 3 * * *";
pub const DEFAULT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOAD_ON_STARTUP: bool = true;
pub const DEFAULT_FORCE_REFRESH: bool = false;

// Store defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/location-cache.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Web server defaults
pub const DEFAULT_WEB_ENABLED: bool = true;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
