//! The single resolution worker
//!
//! All provider calls, cache writes and failure-window updates happen here,
//! one request at a time in arrival order. Keeping a single consumer is what
//! lets the failure window live without a lock; running more than one
//! worker would need a shared window and per-id de-duplication.

use crate::cache::AdvertCache;
use crate::request::{PendingRequest, Resolution};
use advert_resilience::{FailureWindow, RetryOutcome, RetryPolicy};
use advert_traits::AdvertProvider;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Lifecycle state of the resolution worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Service created, worker not spawned yet
    NotStarted,
    /// Waiting on the queue
    Idle,
    /// Working on one request
    Resolving,
    /// Cancellation observed; the worker has exited
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Idle => write!(f, "idle"),
            Self::Resolving => write!(f, "resolving"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

pub(crate) struct ResolutionWorker {
    pub(crate) primary: Arc<dyn AdvertProvider>,
    pub(crate) backup: Arc<dyn AdvertProvider>,
    pub(crate) cache: Arc<AdvertCache>,
    pub(crate) window: FailureWindow,
    pub(crate) policy: RetryPolicy,
    pub(crate) requests: mpsc::UnboundedReceiver<PendingRequest>,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: watch::Sender<WorkerState>,
}

impl ResolutionWorker {
    pub(crate) async fn run(mut self) {
        tracing::info!(
            primary = self.primary.name(),
            backup = self.backup.name(),
            max_attempts = self.policy.max_attempts,
            "Resolution worker started"
        );

        loop {
            self.state.send_replace(WorkerState::Idle);

            let request = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.requests.recv() => match next {
                    Some(request) => request,
                    None => break,
                },
            };

            self.state.send_replace(WorkerState::Resolving);
            self.process(request).await;
        }

        let abandoned = self.drain();
        self.state.send_replace(WorkerState::Stopped);
        tracing::info!(abandoned, "Resolution worker stopped");
    }

    async fn process(&mut self, request: PendingRequest) {
        if request.is_abandoned() {
            tracing::debug!(id = request.id(), "Skipping request with no waiting caller");
            return;
        }
        let resolution = self.resolve(request.id()).await;
        request.complete(resolution);
    }

    async fn resolve(&mut self, id: &str) -> Resolution {
        if self.cancel.is_cancelled() {
            return Resolution::Unresolvable;
        }

        // Another queued request for the same id may have filled the cache.
        if let Some(adv) = self.cache.get(id) {
            tracing::debug!(id, "Resolved from cache on re-check");
            return Resolution::Resolved(adv);
        }

        let primary = &self.primary;
        let outcome = self
            .policy
            .execute(&mut self.window, &self.cancel, |_attempt| primary.fetch(id))
            .await;

        match outcome {
            RetryOutcome::Success(adv) => {
                self.cache.insert(id, adv.clone());
                return Resolution::Resolved(adv);
            }
            RetryOutcome::Cancelled => return Resolution::Unresolvable,
            RetryOutcome::Exhausted { attempts } => {
                tracing::debug!(id, attempts, "Primary exhausted, falling back");
            }
            RetryOutcome::Skipped { recent_failures } => {
                tracing::debug!(id, recent_failures, "Primary skipped, falling back");
            }
        }

        if self.cancel.is_cancelled() {
            return Resolution::Unresolvable;
        }

        match self.backup.fetch(id).await {
            Ok(Some(adv)) => {
                self.cache.insert(id, adv.clone());
                Resolution::Resolved(adv)
            }
            Ok(None) => {
                tracing::debug!(id, "Backup has no advertisement");
                Resolution::Unresolvable
            }
            Err(e) => {
                tracing::error!(id, error = %e, "Backup provider failed");
                Resolution::Failed(e)
            }
        }
    }

    /// Closes the queue and answers everything still in it
    fn drain(&mut self) -> usize {
        self.requests.close();
        let mut count = 0;
        while let Ok(request) = self.requests.try_recv() {
            request.complete(Resolution::Unresolvable);
            count += 1;
        }
        count
    }
}
