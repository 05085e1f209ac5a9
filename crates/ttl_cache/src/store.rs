use std::sync::Arc;
use std::time::{Duration, Instant};

use common::Error;
use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};

/// Generic key/value store with per-entry expiry and prefix invalidation.
///
/// `get` treats expired entries exactly like absent ones — stale data must
/// never leak past this trait. Implementations are safe for concurrent use
/// from multiple request-handling tasks; failures map to
/// `Error::CacheUnavailable` so callers can degrade to a fetch-through.
pub trait CacheStore<V>: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &str) -> Result<Option<V>, Error>;

    /// Insert or replace an entry valid for `ttl` from now.
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), Error>;

    /// Remove every entry whose key starts with `prefix` (exact keys
    /// included). Returns the number of entries removed.
    fn invalidate(&self, prefix: &str) -> Result<usize, Error>;

    /// Drop all entries.
    fn invalidate_all(&self) -> Result<(), Error>;
}

/// Shared handle to a cache store.
pub type SharedCache<V> = Arc<dyn CacheStore<V>>;

#[derive(Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory `CacheStore` backed by `DashMap`.
///
/// Expiry is enforced in `get` and nowhere else; an entry set at time `t`
/// with TTL `d` is valid for `now < t + d`.
pub struct MemoryCache<V> {
    entries: DashMap<String, Entry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone + Send + Sync + 'static> MemoryCache<V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Build a cache on an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone + Send + Sync + 'static> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Result<Option<V>, Error> {
        let now = self.clock.now();
        let live = match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if live.is_none() {
            // Dead entry: evict on the read path so it cannot linger.
            self.entries.remove_if(key, |_, e| now >= e.expires_at);
        }
        Ok(live)
    }

    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), Error> {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn invalidate(&self, prefix: &str) -> Result<usize, Error> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()))
    }

    fn invalidate_all(&self) -> Result<(), Error> {
        self.entries.clear();
        Ok(())
    }
}
