//! Bounded retry around a single provider call
//!
//! The loop is gated by a [`FailureWindow`]: when the window is tripped the
//! whole attempt sequence is skipped. Every failed attempt is recorded in the
//! window, and the pause between attempts can be cut short by cancellation.

use crate::health::FailureWindow;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default number of attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of [`RetryPolicy::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// An attempt produced a value
    Success(T),
    /// Every attempt failed or came back empty
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
    /// The failure window was tripped; no attempt was made
    Skipped {
        /// Failures inside the horizon when the gate was checked
        recent_failures: usize,
    },
    /// Cancellation was observed between attempts
    Cancelled,
}

impl<T> RetryOutcome<T> {
    /// The value, if an attempt succeeded
    pub fn into_value(self) -> Option<T> {
        match self {
            RetryOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// True for [`RetryOutcome::Cancelled`]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryOutcome::Cancelled)
    }
}

/// Fixed-delay retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum total attempts (at least 1)
    pub max_attempts: u32,
    /// Pause after a failed attempt, before the next one
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts; zero is raised to one
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the pause between attempts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `op` until it yields a value or the attempts run out.
    ///
    /// `op` receives the 1-based attempt number. An `Err` is recorded in
    /// `window` and followed by the delay (unless it was the last attempt).
    /// `Ok(None)` uses up an attempt without counting as a failure.
    pub async fn execute<T, E, F, Fut>(
        &self,
        window: &mut FailureWindow,
        cancel: &CancellationToken,
        mut op: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Display,
    {
        let recent_failures = window.recent_failures(Instant::now());
        if recent_failures >= window.max_failures() {
            tracing::info!(
                recent_failures,
                limit = window.max_failures(),
                "Failure limit reached, skipping provider"
            );
            return RetryOutcome::Skipped { recent_failures };
        }

        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        while attempt < max_attempts {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }
            attempt += 1;

            match op(attempt).await {
                Ok(Some(value)) => return RetryOutcome::Success(value),
                Ok(None) => {
                    tracing::debug!(attempt, "Provider returned no value");
                }
                Err(e) => {
                    window.record_failure(Instant::now());
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Provider attempt failed"
                    );

                    if attempt < max_attempts {
                        tracing::trace!(delay = ?self.delay, "Waiting before retry");
                        tokio::select! {
                            _ = cancel.cancelled() => return RetryOutcome::Cancelled,
                            _ = tokio::time::sleep(self.delay) => {}
                        }
                    }
                }
            }
        }

        RetryOutcome::Exhausted { attempts: attempt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(attempts)
            .with_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_attempts_raised_to_one() {
        let policy = RetryPolicy::new().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let mut window = FailureWindow::default();
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let outcome = fast_policy(3)
            .execute(&mut window, &cancel, |_| {
                calls += 1;
                async { Ok::<_, &str>(Some(42)) }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Success(42));
        assert_eq!(calls, 1);
        assert!(window.is_empty());
    }

    #[tokio::test]
    async fn test_eventual_success() {
        let mut window = FailureWindow::default();
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = fast_policy(5)
            .execute(&mut window, &cancel, move |_| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err("not yet")
                    } else {
                        Ok(Some("value"))
                    }
                }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Success("value"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_records_each_failure() {
        let mut window = FailureWindow::default();
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();

        let outcome: RetryOutcome<()> = fast_policy(3)
            .execute(&mut window, &cancel, |attempt| {
                seen.push(attempt);
                async { Err::<Option<()>, _>("always fails") }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(window.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_answers_are_not_failures() {
        let mut window = FailureWindow::default();
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let outcome: RetryOutcome<u8> = fast_policy(3)
            .execute(&mut window, &cancel, |_| {
                calls += 1;
                async { Ok::<_, &str>(None) }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
        assert_eq!(calls, 3);
        assert!(window.is_empty());
    }

    #[tokio::test]
    async fn test_tripped_window_skips_all_attempts() {
        let mut window = FailureWindow::default();
        let now = Instant::now();
        for _ in 0..10 {
            window.record_failure(now);
        }
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let outcome: RetryOutcome<u8> = fast_policy(3)
            .execute(&mut window, &cancel, |_| {
                calls += 1;
                async { Ok::<_, &str>(Some(1)) }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Skipped { recent_failures: 10 });
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts_only() {
        let mut window = FailureWindow::default();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome: RetryOutcome<()> = RetryPolicy::new()
            .with_max_attempts(3)
            .with_delay(Duration::from_secs(1))
            .execute(&mut window, &cancel, |_| async { Err::<Option<()>, _>("down") })
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay() {
        let mut window = FailureWindow::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome: RetryOutcome<()> = RetryPolicy::new()
            .with_max_attempts(3)
            .with_delay(Duration::from_secs(60))
            .execute(&mut window, &cancel, |_| async { Err::<Option<()>, _>("down") })
            .await;

        assert!(outcome.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_outcome_into_value() {
        assert_eq!(RetryOutcome::Success(5).into_value(), Some(5));
        assert_eq!(RetryOutcome::<u8>::Exhausted { attempts: 3 }.into_value(), None);
        assert_eq!(RetryOutcome::<u8>::Cancelled.into_value(), None);
    }

    #[test]
    fn test_blocking_execute() {
        let mut window = FailureWindow::default();
        let cancel = CancellationToken::new();

        let outcome = tokio_test::block_on(fast_policy(2).execute(
            &mut window,
            &cancel,
            |attempt| async move {
                if attempt == 1 {
                    Err("first fails")
                } else {
                    Ok(Some(attempt))
                }
            },
        ));

        assert_eq!(outcome, RetryOutcome::Success(2));
    }
}
