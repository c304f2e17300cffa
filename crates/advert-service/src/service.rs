//! Request gateway and lifecycle controller

use crate::cache::AdvertCache;
use crate::config::ServiceConfig;
use crate::request::{PendingRequest, Resolution};
use crate::worker::{ResolutionWorker, WorkerState};
use advert_error::{AdvertError, Result};
use advert_resilience::{with_optional_timeout, with_timeout};
use advert_traits::{Advertisement, AdvertProvider};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

enum Lifecycle {
    Created {
        requests: mpsc::UnboundedReceiver<PendingRequest>,
        state: watch::Sender<WorkerState>,
    },
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Resolves advertisements from cache, primary provider or backup provider.
///
/// Lookups that miss the cache are queued for a single background worker,
/// started with [`start`](Self::start) and shut down with
/// [`stop`](Self::stop). Each instance owns its cache and failure window.
pub struct AdvertisementService {
    config: ServiceConfig,
    primary: Arc<dyn AdvertProvider>,
    backup: Arc<dyn AdvertProvider>,
    cache: Arc<AdvertCache>,
    requests: mpsc::UnboundedSender<PendingRequest>,
    state: watch::Receiver<WorkerState>,
    lifecycle: Mutex<Lifecycle>,
}

impl AdvertisementService {
    /// Creates a service with the default configuration
    pub fn new(primary: Arc<dyn AdvertProvider>, backup: Arc<dyn AdvertProvider>) -> Self {
        Self::build(primary, backup, ServiceConfig::default())
    }

    /// Creates a service with a validated configuration
    pub fn with_config(
        primary: Arc<dyn AdvertProvider>,
        backup: Arc<dyn AdvertProvider>,
        config: ServiceConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(primary, backup, config))
    }

    fn build(
        primary: Arc<dyn AdvertProvider>,
        backup: Arc<dyn AdvertProvider>,
        config: ServiceConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WorkerState::NotStarted);
        Self {
            cache: Arc::new(AdvertCache::new(config.cache_ttl())),
            config,
            primary,
            backup,
            requests: tx,
            state: state_rx,
            lifecycle: Mutex::new(Lifecycle::Created {
                requests: rx,
                state: state_tx,
            }),
        }
    }

    /// Spawns the resolution worker on the current Tokio runtime.
    ///
    /// Requests queued before this call are served once the worker runs.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AdvertError::Runtime(e.to_string()))?;

        let mut lifecycle = self.lifecycle.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Created { requests, state } => {
                let cancel = CancellationToken::new();
                let worker = ResolutionWorker {
                    primary: self.primary.clone(),
                    backup: self.backup.clone(),
                    cache: self.cache.clone(),
                    window: self.config.failure_window(),
                    policy: self.config.retry_policy(),
                    requests,
                    cancel: cancel.clone(),
                    state,
                };
                let handle = runtime.spawn(
                    worker
                        .run()
                        .instrument(tracing::info_span!("advert_worker")),
                );
                *lifecycle = Lifecycle::Running { cancel, handle };
                Ok(())
            }
            running @ Lifecycle::Running { .. } => {
                *lifecycle = running;
                Err(AdvertError::AlreadyStarted)
            }
            Lifecycle::Stopped => Err(AdvertError::Stopped),
        }
    }

    /// Cancels the worker and waits up to the configured stop timeout.
    ///
    /// Every queued or in-flight caller is answered with "not found". If the
    /// worker misses the deadline it is aborted and
    /// [`AdvertError::ShutdownTimeout`] is returned for the operator; callers
    /// of [`get_advertisement`](Self::get_advertisement) never see it.
    /// Cached advertisements stay readable afterwards.
    pub async fn stop(&self) -> Result<()> {
        let running = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { cancel, handle } => Some((cancel, handle)),
                Lifecycle::Created { .. } | Lifecycle::Stopped => None,
            }
        };

        let Some((cancel, mut handle)) = running else {
            return Ok(());
        };

        tracing::info!("Stopping advertisement service");
        cancel.cancel();

        let timeout = self.config.stop_timeout();
        match with_timeout(timeout, "advert worker shutdown", &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Resolution worker ended abnormally");
                Err(AdvertError::WorkerFailed(e.to_string()))
            }
            Err(e) => {
                tracing::error!(timeout = ?e.duration, "Resolution worker did not stop in time");
                handle.abort();
                Err(AdvertError::ShutdownTimeout(timeout))
            }
        }
    }

    /// Looks up an advertisement.
    ///
    /// Returns `Ok(None)` when no provider has it or the service is shutting
    /// down. Returns `Err` only when the backup provider fails or the
    /// configured request timeout elapses.
    pub async fn get_advertisement(&self, id: &str) -> Result<Option<Advertisement>> {
        if let Some(adv) = self.cache.get(id) {
            tracing::debug!(id, "Cache hit");
            return Ok(Some(adv));
        }

        let (request, completion) = PendingRequest::new(id);
        if self.requests.send(request).is_err() {
            tracing::debug!(id, "Worker no longer accepting requests");
            return Ok(None);
        }
        tracing::debug!(id, "Queued for resolution");

        let resolution = match with_optional_timeout(
            self.config.request_timeout(),
            "advertisement request",
            completion,
        )
        .await
        {
            Ok(Ok(resolution)) => resolution,
            // Worker dropped the request while shutting down
            Ok(Err(_)) => Resolution::Unresolvable,
            Err(e) => {
                tracing::warn!(id, timeout = ?e.duration, "Gave up waiting for advertisement");
                return Err(AdvertError::RequestTimeout(e.duration));
            }
        };

        match resolution {
            Resolution::Resolved(adv) => Ok(Some(adv)),
            Resolution::Unresolvable => Ok(None),
            Resolution::Failed(e) => {
                tracing::error!(id, error = %e, "Advertisement lookup failed");
                Err(AdvertError::Backup(e))
            }
        }
    }

    /// Current worker state
    pub fn worker_state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// True between a successful `start()` and `stop()`
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// The service's cache
    pub fn cache(&self) -> &AdvertCache {
        &self.cache
    }

    /// The configuration in effect
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

impl Drop for AdvertisementService {
    fn drop(&mut self) {
        if let Lifecycle::Running { cancel, .. } = &*self.lifecycle.lock() {
            cancel.cancel();
        }
    }
}

impl std::fmt::Debug for AdvertisementService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvertisementService")
            .field("primary", &self.primary.name())
            .field("backup", &self.backup.name())
            .field("cached", &self.cache.len())
            .field("worker_state", &self.worker_state())
            .finish()
    }
}
