//! Error type definitions for the location cache service
//!
//! The hierarchy mirrors the load pipeline: the fetcher raises
//! [`UpstreamError`], the cache backends raise [`StoreError`], and the loader
//! wraps either of them (plus encoding failures) into a [`LoadError`].

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// A load generation failed
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Cache store errors raised outside of a load (lookups, status)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Resource not found errors
    #[error("Not found: {resource} with code {code}")]
    NotFound { resource: String, code: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures talking to the upstream administrative-division API
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The request did not complete within the configured timeout
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    /// Connection, TLS or body transfer failure
    #[error("Transport error: {url} - {message}")]
    Transport { url: String, message: String },

    /// Non-success HTTP status
    #[error("HTTP error: {status} - {url}")]
    Http { status: u16, url: String },

    /// The body was not a JSON list of provinces
    #[error("Decode error: {message}")]
    Decode { message: String },
}

/// Failures reported by a cache store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// A write was rejected
    #[error("Write failed: {key} - {message}")]
    WriteFailed { key: String, message: String },

    /// A read was rejected
    #[error("Read failed: {key} - {message}")]
    ReadFailed { key: String, message: String },
}

/// Any fatal condition during a single load generation
///
/// The guard flag is never touched when one of these is returned.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Upstream fetch failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Cache write failed: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode {level} {code}: {source}")]
    Encode {
        level: String,
        code: u32,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a not found error for a division
    pub fn not_found<R: Into<String>, C: Into<String>>(resource: R, code: C) -> Self {
        Self::NotFound {
            resource: resource.into(),
            code: code.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl UpstreamError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create a transport error
    pub fn transport<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode<M: Into<String>>(message: M) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// Timeouts, transport failures, 5xx and 429 are transient; a body that
    /// does not decode or any other 4xx will fail the same way next time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Decode { .. } => false,
        }
    }
}

impl StoreError {
    /// Create a write failed error
    pub fn write_failed<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::WriteFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a read failed error
    pub fn read_failed<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ReadFailed {
            key: key.into(),
            message: message.into(),
        }
    }
}
