//! # Advert Error
//!
//! Error types shared by the advertisement resolution crates.
//!
//! ## Error Categories
//!
//! - [`ProviderError`] - failures raised by a primary or backup provider
//! - [`AdvertError`] - service-level errors returned to callers and operators
//!
//! Only a backup-provider failure ever reaches a caller of
//! `get_advertisement`; primary failures are absorbed by the retry loop.
//!
//! ## Example
//!
//! ```
//! use advert_error::{AdvertError, ProviderError};
//!
//! let err = AdvertError::Backup(ProviderError::Unavailable("sql down".into()));
//! assert!(err.is_backup_failure());
//! assert!(err.to_string().contains("sql down"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;
use thiserror::Error;

/// Errors raised by an advertisement provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider could not be reached or refused the call
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider did not answer in time
    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    /// Provider answered with a backend failure
    #[error("Provider '{provider}' failed: {message}")]
    Backend {
        /// Provider name
        provider: String,
        /// Failure description
        message: String,
    },

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Builds a [`ProviderError::Backend`] error.
    pub fn backend(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Backend {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Service-level errors.
#[derive(Error, Debug)]
pub enum AdvertError {
    // ============ Resolution Errors ============
    /// The backup provider failed; there is no further fallback
    #[error("Backup provider failed: {0}")]
    Backup(#[source] ProviderError),

    /// The caller-side bound on waiting for a queued request elapsed
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    // ============ Lifecycle Errors ============
    /// `start()` called on a running service
    #[error("Service already started")]
    AlreadyStarted,

    /// `start()` called after the service was stopped
    #[error("Service has been stopped")]
    Stopped,

    /// The worker did not reach `Stopped` within the stop timeout
    #[error("Worker did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// The worker task ended abnormally
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// No async runtime available to host the worker
    #[error("Runtime unavailable: {0}")]
    Runtime(String),

    // ============ Configuration Errors ============
    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO failure while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ============ Generic ============
    /// Wrapped external error with context
    #[error("{message}")]
    External {
        /// Context plus the original message
        message: String,
    },
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, AdvertError>;

impl AdvertError {
    /// Returns true if this error came from the backup provider
    pub fn is_backup_failure(&self) -> bool {
        matches!(self, AdvertError::Backup(_))
    }

    /// Returns true for operational faults that concern the operator rather
    /// than the caller of a lookup
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            AdvertError::ShutdownTimeout(_)
                | AdvertError::WorkerFailed(_)
                | AdvertError::Runtime(_)
                | AdvertError::AlreadyStarted
                | AdvertError::Stopped
        )
    }
}

impl From<ProviderError> for AdvertError {
    fn from(err: ProviderError) -> Self {
        AdvertError::Backup(err)
    }
}

/// Adds context to foreign errors, converting them to [`AdvertError`].
pub trait ErrorContext<T> {
    /// Attach a static context message
    fn context(self, ctx: impl Into<String>) -> Result<T>;

    /// Attach a lazily built context message
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| AdvertError::External {
            message: format!("{}: {}", ctx.into(), e),
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| AdvertError::External {
            message: format!("{}: {}", f(), e),
        })
    }
}
