//! # Advert Service
//!
//! Resolves advertisement ids through a TTL cache, a retried and
//! health-gated primary provider, and a backup provider of last resort.
//!
//! ## Features
//!
//! - Concurrent cache fast path, no queueing on a hit
//! - One background worker serving lookups strictly in arrival order
//! - Bounded retries against the primary with a cancellable delay
//! - Primary skipped entirely after too many failures in the last hour
//! - Clean shutdown: every waiting caller is answered
//!
//! ## Example
//!
//! ```ignore
//! use advert_service::{AdvertisementService, ServiceConfig};
//!
//! let service = AdvertisementService::with_config(primary, backup, ServiceConfig::from_env())?;
//! service.start()?;
//!
//! match service.get_advertisement("42").await? {
//!     Some(adv) => println!("{}", adv.name),
//!     None => println!("no advertisement"),
//! }
//!
//! service.stop().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod request;
mod service;
mod worker;

pub use cache::{AdvertCache, DEFAULT_CACHE_TTL};
pub use config::ServiceConfig;
pub use request::{PendingRequest, Resolution};
pub use service::AdvertisementService;
pub use worker::WorkerState;

pub use advert_error::{AdvertError, Result};
pub use advert_traits::{Advertisement, AdvertProvider, ProviderError, ProviderResult};
