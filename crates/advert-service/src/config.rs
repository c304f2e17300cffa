//! Service configuration
//!
//! Every value has a default matching the advertisement domain; any of them
//! can come from a JSON file or `ADVERT_*` environment variables.

use advert_error::{AdvertError, ErrorContext, Result};
use advert_resilience::{FailureWindow, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable for [`ServiceConfig::retry_count`]
pub const ENV_RETRY_COUNT: &str = "ADVERT_RETRY_COUNT";
/// Environment variable for [`ServiceConfig::retry_delay_ms`]
pub const ENV_RETRY_DELAY_MS: &str = "ADVERT_RETRY_DELAY_MS";
/// Environment variable for [`ServiceConfig::cache_ttl_secs`]
pub const ENV_CACHE_TTL_SECS: &str = "ADVERT_CACHE_TTL_SECS";
/// Environment variable for [`ServiceConfig::failure_horizon_secs`]
pub const ENV_FAILURE_HORIZON_SECS: &str = "ADVERT_FAILURE_HORIZON_SECS";
/// Environment variable for [`ServiceConfig::max_failures`]
pub const ENV_MAX_FAILURES: &str = "ADVERT_MAX_FAILURES";
/// Environment variable for [`ServiceConfig::stop_timeout_secs`]
pub const ENV_STOP_TIMEOUT_SECS: &str = "ADVERT_STOP_TIMEOUT_SECS";
/// Environment variable for [`ServiceConfig::request_timeout_ms`]
pub const ENV_REQUEST_TIMEOUT_MS: &str = "ADVERT_REQUEST_TIMEOUT_MS";

/// Configuration for an [`AdvertisementService`](crate::AdvertisementService)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Attempts against the primary provider per request
    pub retry_count: u32,
    /// Pause between primary attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Cache TTL in seconds
    pub cache_ttl_secs: u64,
    /// Failure window horizon in seconds
    pub failure_horizon_secs: u64,
    /// Recent failures that close the primary gate
    pub max_failures: usize,
    /// How long `stop()` waits for the worker, in seconds
    pub stop_timeout_secs: u64,
    /// Upper bound on a caller's wait for a queued request; `None` waits forever
    pub request_timeout_ms: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            retry_delay_ms: 1_000,
            cache_ttl_secs: 300,
            failure_horizon_secs: 3_600,
            max_failures: 10,
            stop_timeout_secs: 100,
            request_timeout_ms: None,
        }
    }
}

impl ServiceConfig {
    /// Creates the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the primary retry count
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Sets the delay between primary attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Sets the failure window horizon
    pub fn with_failure_horizon(mut self, horizon: Duration) -> Self {
        self.failure_horizon_secs = horizon.as_secs();
        self
    }

    /// Sets the failure limit
    pub fn with_max_failures(mut self, max: usize) -> Self {
        self.max_failures = max;
        self
    }

    /// Sets the stop timeout
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_secs = timeout.as_secs();
        self
    }

    /// Bounds how long callers wait for a queued request
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry_count == 0 {
            return Err(AdvertError::InvalidConfig("retry_count must be at least 1".into()));
        }
        if self.max_failures == 0 {
            return Err(AdvertError::InvalidConfig("max_failures must be at least 1".into()));
        }
        if self.cache_ttl_secs == 0 {
            return Err(AdvertError::InvalidConfig("cache_ttl_secs must be positive".into()));
        }
        if self.failure_horizon_secs == 0 {
            return Err(AdvertError::InvalidConfig("failure_horizon_secs must be positive".into()));
        }
        Ok(())
    }

    /// Reads the configuration from `ADVERT_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from a key lookup.
    ///
    /// Missing keys keep their default. Unparseable values are logged and
    /// also keep their default; so does a retry count of zero.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let request_timeout_ms = match lookup(ENV_REQUEST_TIMEOUT_MS) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(ms),
                _ => {
                    tracing::warn!(key = ENV_REQUEST_TIMEOUT_MS, value = %raw, "Ignoring invalid setting");
                    defaults.request_timeout_ms
                }
            },
            None => defaults.request_timeout_ms,
        };

        Self {
            retry_count: parse_or(&lookup, ENV_RETRY_COUNT, defaults.retry_count, |v| *v >= 1),
            retry_delay_ms: parse_or(&lookup, ENV_RETRY_DELAY_MS, defaults.retry_delay_ms, |_| true),
            cache_ttl_secs: parse_or(&lookup, ENV_CACHE_TTL_SECS, defaults.cache_ttl_secs, |v| *v > 0),
            failure_horizon_secs: parse_or(
                &lookup,
                ENV_FAILURE_HORIZON_SECS,
                defaults.failure_horizon_secs,
                |v| *v > 0,
            ),
            max_failures: parse_or(&lookup, ENV_MAX_FAILURES, defaults.max_failures, |v| *v > 0),
            stop_timeout_secs: parse_or(&lookup, ENV_STOP_TIMEOUT_SECS, defaults.stop_timeout_secs, |_| true),
            request_timeout_ms,
        }
    }

    /// Loads a JSON configuration file; absent keys take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Cache TTL
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Stop timeout
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Caller-side wait bound, if any
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Retry policy for the primary provider
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.retry_count)
            .with_delay(Duration::from_millis(self.retry_delay_ms))
    }

    /// Fresh failure window for the primary provider
    pub fn failure_window(&self) -> FailureWindow {
        FailureWindow::new(Duration::from_secs(self.failure_horizon_secs), self.max_failures)
    }
}

fn parse_or<T, F, V>(lookup: &F, key: &str, default: T, valid: V) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, default = %default, "Ignoring invalid setting");
            default
        }
    }
}
