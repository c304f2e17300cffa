//! TTL cache of resolved advertisements
//!
//! Readers hit the map from any task; only the resolution worker writes.
//! Expiry is lazy: an entry past its deadline is reported absent on read
//! and left in place until it is overwritten or purged.

use advert_traits::Advertisement;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default time-to-live for a cached advertisement
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Advertisement,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent advertisement cache keyed by id
#[derive(Debug)]
pub struct AdvertCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl Default for AdvertCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl AdvertCache {
    /// Creates an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// TTL applied by [`AdvertCache::insert`]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the advertisement if present and not expired
    pub fn get(&self, id: &str) -> Option<Advertisement> {
        let now = Instant::now();
        self.entries.get(id).and_then(|entry| {
            if entry.is_valid(now) {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    /// Stores `value` under `id` with the cache's TTL, replacing any entry
    pub fn insert(&self, id: impl Into<String>, value: Advertisement) {
        self.put(id, value, self.ttl);
    }

    /// Stores `value` under `id` for `ttl`, replacing any entry
    pub fn put(&self, id: impl Into<String>, value: Advertisement, ttl: Duration) {
        self.entries.insert(
            id.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drops the entry for `id`
    pub fn invalidate(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Removes every expired entry
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
