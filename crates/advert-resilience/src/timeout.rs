//! Timeout helpers
//!
//! Used to bound the service's stop sequence and, optionally, how long a
//! caller waits on a queued request.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Default time `stop()` waits for the worker
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(100);

/// Timeout error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Operation '{operation}' timed out after {duration:?}")]
pub struct TimeoutError {
    /// The operation that timed out
    pub operation: String,
    /// The timeout duration
    pub duration: Duration,
}

/// Execute a future with a timeout
pub async fn with_timeout<T>(
    duration: Duration,
    operation: impl Into<String>,
    future: impl Future<Output = T>,
) -> Result<T, TimeoutError> {
    let op = operation.into();
    timeout(duration, future).await.map_err(|_| TimeoutError {
        operation: op,
        duration,
    })
}

/// Execute with an optional bound; `None` waits indefinitely
pub async fn with_optional_timeout<T>(
    duration: Option<Duration>,
    operation: impl Into<String>,
    future: impl Future<Output = T>,
) -> Result<T, TimeoutError> {
    match duration {
        Some(duration) => with_timeout(duration, operation, future).await,
        None => Ok(future.await),
    }
}
