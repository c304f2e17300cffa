//! # Advert Traits
//!
//! The [`Advertisement`] record and the [`AdvertProvider`] capability every
//! upstream source implements. Concrete providers live outside the core
//! crates; the resolution engine only ever sees `Arc<dyn AdvertProvider>`.
//!
//! ## Example
//!
//! ```ignore
//! use advert_traits::prelude::*;
//!
//! async fn lookup<P: AdvertProvider>(provider: &P) -> ProviderResult<Option<Advertisement>> {
//!     provider.fetch("42").await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use advert_error::ProviderError;

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// An advertisement as returned by a provider.
///
/// Values are produced by providers and never mutated afterwards; the
/// service hands out clones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Advertisement {
    /// Identifier the advertisement is looked up by
    pub web_id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl Advertisement {
    /// Creates an advertisement with an empty description
    pub fn new(web_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            web_id: web_id.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.web_id)
    }
}

/// Which slot a provider fills in the resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderRole {
    /// Preferred provider, retried and health-gated
    Primary,
    /// Fallback of last resort, called once
    Backup,
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backup => write!(f, "backup"),
        }
    }
}

/// Upstream source of advertisements.
///
/// `Ok(None)` means the provider has no advertisement for `id`; `Err` means
/// the call itself failed. The service may call `fetch` repeatedly for the
/// same id.
#[async_trait]
pub trait AdvertProvider: Send + Sync {
    /// Fetches the advertisement with the given id
    async fn fetch(&self, id: &str) -> ProviderResult<Option<Advertisement>>;

    /// Human-readable provider name, used in logs
    fn name(&self) -> &str {
        "provider"
    }
}

#[async_trait]
impl<P: AdvertProvider + ?Sized> AdvertProvider for Arc<P> {
    async fn fetch(&self, id: &str) -> ProviderResult<Option<Advertisement>> {
        (**self).fetch(id).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Commonly used items
pub mod prelude {
    pub use crate::{Advertisement, AdvertProvider, ProviderError, ProviderResult, ProviderRole};
}
