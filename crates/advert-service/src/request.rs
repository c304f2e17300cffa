//! Queued lookups and their single-assignment completion slot

use advert_traits::{Advertisement, ProviderError};
use tokio::sync::oneshot;

/// What the worker decided for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An advertisement was found (and cached)
    Resolved(Advertisement),
    /// Nothing could be found, or the service is shutting down
    Unresolvable,
    /// The backup provider failed
    Failed(ProviderError),
}

/// A lookup travelling from the gateway to the worker
#[derive(Debug)]
pub struct PendingRequest {
    id: String,
    completion: oneshot::Sender<Resolution>,
}

impl PendingRequest {
    /// Creates a request and the receiver its caller waits on
    pub fn new(id: impl Into<String>) -> (Self, oneshot::Receiver<Resolution>) {
        let (completion, rx) = oneshot::channel();
        (
            Self {
                id: id.into(),
                completion,
            },
            rx,
        )
    }

    /// Advertisement id being resolved
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when the caller stopped waiting
    pub fn is_abandoned(&self) -> bool {
        self.completion.is_closed()
    }

    /// Sets the result; consumes the request so it can only happen once
    pub fn complete(self, resolution: Resolution) {
        if self.completion.send(resolution).is_err() {
            tracing::debug!(id = %self.id, "Caller went away before completion");
        }
    }
}
