//! Utility modules for the location cache service

pub mod cron_helper;
pub mod jitter;
pub mod normalize;
pub mod retry;

pub use normalize::{normalize, normalize_name};
pub use retry::with_retry;
