//! Start/stop behaviour of the advertisement service

use advert_service::{AdvertError, AdvertisementService, ServiceConfig, WorkerState};
use advert_testing::{advertisement, init_test_tracing, GatedProvider, MockProvider};
use std::sync::Arc;
use std::time::Duration;

async fn wait_for_calls(provider: &MockProvider, calls: u32) {
    while provider.total_calls() < calls {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Start
// ============================================================================

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let service = AdvertisementService::new(
        MockProvider::new("primary").shared(),
        MockProvider::new("backup").shared(),
    );

    service.start().unwrap();
    assert!(matches!(service.start(), Err(AdvertError::AlreadyStarted)));
    assert!(service.is_running());

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_after_stop_is_rejected() {
    let service = AdvertisementService::new(
        MockProvider::new("primary").shared(),
        MockProvider::new("backup").shared(),
    );

    service.start().unwrap();
    service.stop().await.unwrap();
    assert!(matches!(service.start(), Err(AdvertError::Stopped)));
    assert!(!service.is_running());
}

#[test]
fn test_start_without_runtime_fails() {
    let service = AdvertisementService::new(
        MockProvider::new("primary").shared(),
        MockProvider::new("backup").shared(),
    );

    assert!(matches!(service.start(), Err(AdvertError::Runtime(_))));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = ServiceConfig::new().with_retry_count(0);
    let result = AdvertisementService::with_config(
        MockProvider::new("primary").shared(),
        MockProvider::new("backup").shared(),
        config,
    );

    assert!(matches!(result, Err(AdvertError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_worker_state_transitions() {
    let service = AdvertisementService::new(
        MockProvider::new("primary")
            .with_advertisement(advertisement("1"))
            .shared(),
        MockProvider::new("backup").shared(),
    );
    assert_eq!(service.worker_state(), WorkerState::NotStarted);

    service.start().unwrap();
    service.get_advertisement("1").await.unwrap();
    assert_eq!(service.worker_state(), WorkerState::Idle);

    service.stop().await.unwrap();
    assert_eq!(service.worker_state(), WorkerState::Stopped);
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_answers_queued_requests_with_none() {
    init_test_tracing();
    let primary = MockProvider::new("primary").failing("down").shared();
    let backup = MockProvider::new("backup")
        .with_advertisement(advertisement("cached"))
        .with_advertisement(advertisement("1"))
        .with_advertisement(advertisement("2"))
        .with_advertisement(advertisement("3"))
        .shared();
    let config = ServiceConfig::new().with_retry_delay(Duration::from_secs(60));
    let service = Arc::new(
        AdvertisementService::with_config(primary.clone(), backup.clone(), config).unwrap(),
    );
    service.start().unwrap();

    // Max failures is 10, so the first three lookups all reach the primary
    service.get_advertisement("cached").await.unwrap();
    assert_eq!(primary.total_calls(), 3);

    let callers: Vec<_> = ["1", "2", "3"]
        .into_iter()
        .map(|id| {
            let service = service.clone();
            tokio::spawn(async move { service.get_advertisement(id).await })
        })
        .collect();

    // Worker is now sleeping between attempts for "1"
    wait_for_calls(&primary, 4).await;

    service.stop().await.unwrap();

    for caller in callers {
        assert_eq!(caller.await.unwrap().unwrap(), None);
    }
    assert_eq!(backup.calls_for("1"), 0);
    assert_eq!(backup.calls_for("2"), 0);
    assert_eq!(primary.calls_for("2"), 0);

    // Cache survives shutdown, misses return None without a worker
    assert_eq!(
        service.get_advertisement("cached").await.unwrap(),
        Some(advertisement("cached"))
    );
    assert_eq!(service.get_advertisement("1").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_times_out_on_stuck_provider() {
    init_test_tracing();
    let gated = Arc::new(GatedProvider::new(
        MockProvider::new("primary").with_advertisement(advertisement("1")),
    ));
    let config = ServiceConfig::new().with_stop_timeout(Duration::from_secs(1));
    let service = Arc::new(
        AdvertisementService::with_config(
            gated.clone(),
            MockProvider::new("backup").shared(),
            config,
        )
        .unwrap(),
    );
    service.start().unwrap();

    let caller = tokio::spawn({
        let service = service.clone();
        async move { service.get_advertisement("1").await }
    });
    gated.wait_entered().await;

    let err = service.stop().await.unwrap_err();
    assert!(matches!(err, AdvertError::ShutdownTimeout(d) if d == Duration::from_secs(1)));

    // The aborted worker dropped the request, so the caller sees "not found"
    assert_eq!(caller.await.unwrap().unwrap(), None);
    assert!(!service.is_running());
}

#[tokio::test]
async fn test_stop_before_start_is_noop() {
    let service = AdvertisementService::new(
        MockProvider::new("primary").shared(),
        MockProvider::new("backup").shared(),
    );

    service.stop().await.unwrap();
    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let service = AdvertisementService::new(
        MockProvider::new("primary").shared(),
        MockProvider::new("backup").shared(),
    );

    service.start().unwrap();
    service.stop().await.unwrap();
    service.stop().await.unwrap();
}

// ============================================================================
// Request timeout
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_request_timeout_reaches_caller() {
    let gated = Arc::new(GatedProvider::new(
        MockProvider::new("primary").with_advertisement(advertisement("1")),
    ));
    let config = ServiceConfig::new().with_request_timeout(Duration::from_millis(500));
    let service = AdvertisementService::with_config(
        gated.clone(),
        MockProvider::new("backup").shared(),
        config,
    )
    .unwrap();
    service.start().unwrap();

    let err = service.get_advertisement("1").await.unwrap_err();
    assert!(matches!(err, AdvertError::RequestTimeout(d) if d == Duration::from_millis(500)));

    // The worker still finishes and caches the late answer
    gated.release();
    service.stop().await.unwrap();
    assert_eq!(service.cache().get("1"), Some(advertisement("1")));
}

// ============================================================================
// Configuration file
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_service_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("advert.json");
    std::fs::write(&path, r#"{ "retry_count": 2, "retry_delay_ms": 10 }"#).unwrap();

    let config = ServiceConfig::load(&path).unwrap();
    let primary = MockProvider::new("primary").failing("down").shared();
    let backup = MockProvider::new("backup")
        .with_advertisement(advertisement("7"))
        .shared();
    let service = AdvertisementService::with_config(primary.clone(), backup, config).unwrap();
    service.start().unwrap();

    assert!(service.get_advertisement("7").await.unwrap().is_some());
    assert_eq!(primary.calls_for("7"), 2);

    service.stop().await.unwrap();
}
