//! # Advert Testing Infrastructure
//!
//! Test doubles and generators for the advertisement service:
//! - Scripted mock providers with call counters
//! - A gated provider for holding the worker mid-call
//! - Fixtures matching the canonical "Adv N" records
//! - Property-based testing strategies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use advert_testing::*;
//!
//! let primary = MockProvider::new("primary").failing("Fake exception");
//! let backup = MockProvider::new("backup").with_advertisement(advertisement("3"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use advert_traits::{Advertisement, AdvertProvider, ProviderError, ProviderResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

// ============================================================================
// Fixtures
// ============================================================================

/// Canonical advertisement for `id`: name "Adv {id}", description "Advertisement {id}"
pub fn advertisement(id: &str) -> Advertisement {
    Advertisement::new(id, format!("Adv {}", id)).with_description(format!("Advertisement {}", id))
}

/// Installs a test-writer tracing subscriber. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Mock Provider
// ============================================================================

#[derive(Debug, Clone)]
enum Behavior {
    Answer,
    AlwaysFail(String),
    FailFirst { remaining: u32, message: String },
}

/// Scripted provider that counts every call.
///
/// By default it answers from its table and returns `Ok(None)` for unknown ids.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    answers: Mutex<HashMap<String, Advertisement>>,
    behavior: Mutex<Behavior>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<String, u32>>,
    total: AtomicU32,
}

impl MockProvider {
    /// Creates an empty provider
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            answers: Mutex::new(HashMap::new()),
            behavior: Mutex::new(Behavior::Answer),
            latency: None,
            calls: Mutex::new(HashMap::new()),
            total: AtomicU32::new(0),
        }
    }

    /// Adds an answer keyed by the advertisement's id
    pub fn with_advertisement(self, adv: Advertisement) -> Self {
        self.insert(adv);
        self
    }

    /// Every call fails with `message`
    pub fn failing(self, message: impl Into<String>) -> Self {
        *self.behavior.lock() = Behavior::AlwaysFail(message.into());
        self
    }

    /// The first `count` calls fail, later calls answer normally
    pub fn failing_first(self, count: u32, message: impl Into<String>) -> Self {
        *self.behavior.lock() = Behavior::FailFirst {
            remaining: count,
            message: message.into(),
        };
        self
    }

    /// Each call sleeps for `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds or replaces an answer
    pub fn insert(&self, adv: Advertisement) {
        self.answers.lock().insert(adv.web_id.clone(), adv);
    }

    /// Switches back to answering from the table
    pub fn recover(&self) {
        *self.behavior.lock() = Behavior::Answer;
    }

    /// Calls made for `id`
    pub fn calls_for(&self, id: &str) -> u32 {
        self.calls.lock().get(id).copied().unwrap_or(0)
    }

    /// Calls made for any id
    pub fn total_calls(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }

    /// Wraps the provider in an `Arc` for sharing with the service
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn next_failure(&self) -> Option<String> {
        let mut behavior = self.behavior.lock();
        match &mut *behavior {
            Behavior::Answer => None,
            Behavior::AlwaysFail(message) => Some(message.clone()),
            Behavior::FailFirst { remaining, message } => {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
                Some(message.clone())
            }
        }
    }
}

#[async_trait]
impl AdvertProvider for MockProvider {
    async fn fetch(&self, id: &str) -> ProviderResult<Option<Advertisement>> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(id.to_string()).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(message) = self.next_failure() {
            return Err(ProviderError::backend(self.name.clone(), message));
        }

        Ok(self.answers.lock().get(id).cloned())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Gated Provider
// ============================================================================

/// Provider that parks every call until [`GatedProvider::release`] is called.
///
/// Lets a test hold the worker inside a provider call that ignores
/// cancellation.
#[derive(Debug)]
pub struct GatedProvider {
    inner: MockProvider,
    open: watch::Sender<bool>,
    entered: Notify,
}

impl GatedProvider {
    /// Wraps `inner`; the gate starts closed
    pub fn new(inner: MockProvider) -> Self {
        let (open, _) = watch::channel(false);
        Self {
            inner,
            open,
            entered: Notify::new(),
        }
    }

    /// Opens the gate for all current and future calls
    pub fn release(&self) {
        self.open.send_replace(true);
    }

    /// Resolves once a call has entered the provider
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// The wrapped mock, for call counts
    pub fn inner(&self) -> &MockProvider {
        &self.inner
    }
}

#[async_trait]
impl AdvertProvider for GatedProvider {
    async fn fetch(&self, id: &str) -> ProviderResult<Option<Advertisement>> {
        self.entered.notify_one();
        let mut open = self.open.subscribe();
        if open.wait_for(|is_open| *is_open).await.is_err() {
            return Err(ProviderError::Unavailable("gate dropped".to_string()));
        }
        self.inner.fetch(id).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ============================================================================
// Property-Based Testing Strategies
// ============================================================================

/// Strategy for advertisement ids
pub fn advert_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,16}"
}

/// Strategy for whole advertisements
pub fn any_advertisement() -> impl Strategy<Value = Advertisement> {
    (advert_id(), "[A-Za-z0-9 ]{1,32}", ".{0,64}").prop_map(|(id, name, description)| {
        Advertisement::new(id, name).with_description(description)
    })
}

/// Strategy for sets of distinct ids
pub fn distinct_ids(max: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set(advert_id(), 1..=max.max(1))
        .prop_map(|ids| ids.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_matches_canonical_shape() {
        let adv = advertisement("10");
        assert_eq!(adv.web_id, "10");
        assert_eq!(adv.name, "Adv 10");
        assert_eq!(adv.description, "Advertisement 10");
    }

    #[tokio::test]
    async fn test_mock_answers_and_counts() {
        let provider = MockProvider::new("primary").with_advertisement(advertisement("1"));

        assert_eq!(provider.fetch("1").await, Ok(Some(advertisement("1"))));
        assert_eq!(provider.fetch("2").await, Ok(None));
        assert_eq!(provider.calls_for("1"), 1);
        assert_eq!(provider.calls_for("2"), 1);
        assert_eq!(provider.total_calls(), 2);
        assert_eq!(provider.name(), "primary");
    }

    #[tokio::test]
    async fn test_mock_always_fails() {
        let provider = MockProvider::new("primary")
            .with_advertisement(advertisement("1"))
            .failing("Fake exception");

        for _ in 0..3 {
            assert!(provider.fetch("1").await.is_err());
        }
        provider.recover();
        assert!(provider.fetch("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mock_fails_first_n() {
        let provider = MockProvider::new("primary")
            .with_advertisement(advertisement("1"))
            .failing_first(2, "flaky");

        assert!(provider.fetch("1").await.is_err());
        assert!(provider.fetch("1").await.is_err());
        assert!(provider.fetch("1").await.unwrap().is_some());
        assert_eq!(provider.calls_for("1"), 3);
    }

    #[tokio::test]
    async fn test_gated_provider_holds_until_release() {
        let gated = Arc::new(GatedProvider::new(
            MockProvider::new("backup").with_advertisement(advertisement("5")),
        ));

        let caller = gated.clone();
        let handle = tokio::spawn(async move { caller.fetch("5").await });

        gated.wait_entered().await;
        assert!(!handle.is_finished());

        gated.release();
        let result = handle.await.unwrap();
        assert_eq!(result, Ok(Some(advertisement("5"))));
        assert_eq!(gated.inner().calls_for("5"), 1);
    }

    proptest! {
        #[test]
        fn test_advert_id_is_non_empty(id in advert_id()) {
            prop_assert!(!id.is_empty());
            prop_assert!(id.len() <= 16);
        }

        #[test]
        fn test_distinct_ids_are_unique(ids in distinct_ids(8)) {
            let unique: std::collections::HashSet<_> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());
        }
    }
}
