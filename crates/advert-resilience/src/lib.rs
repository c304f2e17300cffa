//! # Advert Resilience
//!
//! Resilience building blocks for the advertisement resolution worker:
//!
//! - **Failure Window**: sliding one-hour record of provider failures that
//!   decides whether the primary provider is eligible
//! - **Retry Policy**: fixed-delay, cancellable retry loop gated by the window
//! - **Timeouts**: bounded waits for shutdown and callers
//!
//! ## Retry Policy
//!
//! ```rust
//! use advert_resilience::{FailureWindow, RetryOutcome, RetryPolicy};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let mut window = FailureWindow::default();
//! let cancel = CancellationToken::new();
//! let policy = RetryPolicy::new()
//!     .with_max_attempts(3)
//!     .with_delay(Duration::from_millis(10));
//!
//! let outcome = policy
//!     .execute(&mut window, &cancel, |_attempt| async { Ok::<_, &str>(Some("ad")) })
//!     .await;
//! assert_eq!(outcome, RetryOutcome::Success("ad"));
//! # }
//! ```
//!
//! ## Failure Window
//!
//! ```rust
//! use advert_resilience::{FailureWindow, HealthStatus};
//! use tokio::time::Instant;
//!
//! let mut window = FailureWindow::default();
//! let now = Instant::now();
//! window.record_failure(now);
//! assert_eq!(window.status(now), HealthStatus::Degraded);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod health;
pub mod retry_policy;
pub mod timeout;

pub use health::{FailureWindow, HealthStatus, DEFAULT_FAILURE_HORIZON, DEFAULT_MAX_FAILURES};

pub use retry_policy::{RetryOutcome, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

pub use timeout::{with_optional_timeout, with_timeout, TimeoutError, DEFAULT_STOP_TIMEOUT};
