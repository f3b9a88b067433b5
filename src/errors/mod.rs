//! Centralized error handling for the location cache service
//!
//! This module unifies the error types raised by each layer of the cache
//! builder so that a failed load surfaces to its trigger as a single error.
//!
//! # Error Categories
//!
//! - **Upstream Errors**: the administrative-division API was unreachable,
//!   timed out, answered with a non-success status or an undecodable body
//! - **Store Errors**: the key-value cache rejected a read or a write
//! - **Load Errors**: any fatal condition during one load generation
//! - **Configuration Errors**: invalid cron expression, time zone or URL
//!
//! # Usage
//!
//! ```rust
//! use location_cache::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("scheduler.cron must not be empty"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for cache store Results
pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience type alias for upstream fetch Results
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Convenience type alias for load Results
pub type LoadResult<T> = Result<T, LoadError>;
