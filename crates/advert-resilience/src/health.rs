//! Sliding-window failure tracking for the primary provider
//!
//! Keeps the timestamps of recent provider failures so the resolution
//! worker can decide whether the primary is currently worth calling.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Default look-back horizon
pub const DEFAULT_FAILURE_HORIZON: Duration = Duration::from_secs(60 * 60);

/// Default number of recent failures that closes the primary gate
pub const DEFAULT_MAX_FAILURES: usize = 10;

/// Health of a provider as seen through its failure window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// No failures inside the horizon
    Healthy,
    /// Some failures, still below the limit
    Degraded,
    /// Failure limit reached; the provider should be skipped
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Bounded, time-ordered record of provider failures.
///
/// Owned by exactly one task, so it takes `&mut self` and carries no lock.
/// Entries older than the horizon are dropped, and the length never exceeds
/// `max_failures`. Pruning always removes the oldest entry first, which keeps
/// a count of `max_failures` exact.
#[derive(Debug, Clone)]
pub struct FailureWindow {
    horizon: Duration,
    max_failures: usize,
    failures: VecDeque<Instant>,
}

impl Default for FailureWindow {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_HORIZON, DEFAULT_MAX_FAILURES)
    }
}

impl FailureWindow {
    /// Create a window with the given horizon and failure cap
    pub fn new(horizon: Duration, max_failures: usize) -> Self {
        let max_failures = max_failures.max(1);
        Self {
            horizon,
            max_failures,
            failures: VecDeque::with_capacity(max_failures + 1),
        }
    }

    /// Look-back horizon
    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Failure count at which the window reports unhealthy
    pub fn max_failures(&self) -> usize {
        self.max_failures
    }

    /// Record a failure observed at `now`
    pub fn record_failure(&mut self, now: Instant) {
        self.failures.push_back(now);
        self.prune(now);
    }

    /// Number of retained failures younger than the horizon at `now`
    pub fn recent_failures(&self, now: Instant) -> usize {
        self.failures
            .iter()
            .filter(|at| now.saturating_duration_since(**at) < self.horizon)
            .count()
    }

    /// Whether the failure limit has been reached at `now`
    pub fn is_tripped(&self, now: Instant) -> bool {
        self.recent_failures(now) >= self.max_failures
    }

    /// Status derived from the failure count at `now`
    pub fn status(&self, now: Instant) -> HealthStatus {
        match self.recent_failures(now) {
            0 => HealthStatus::Healthy,
            n if n >= self.max_failures => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        }
    }

    /// Number of stored timestamps, including ones that may have aged out
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Forget all failures
    pub fn clear(&mut self) {
        self.failures.clear();
    }

    fn prune(&mut self, now: Instant) {
        while self.failures.len() > self.max_failures {
            self.failures.pop_front();
        }
        while let Some(oldest) = self.failures.front() {
            if now.saturating_duration_since(*oldest) >= self.horizon {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}
