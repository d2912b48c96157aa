//! In-memory identity cache.
//!
//! Memoizes expensive provider lookups (detail fetches and cross references,
//! never searches) under provider-and-kind-qualified keys such as
//! `"movie###19995###en-US"`. Entries live for a fixed time-to-live measured
//! from when they were stored; reading an entry does not extend it. Once the
//! store is full the least recently used entry is evicted.
//!
//! A stored `None` is a real entry: "this id has no details" is remembered so
//! the round trip is not repeated.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

/// Default maximum number of entries.
pub const DEFAULT_CAPACITY: usize = 200;

/// Default time-to-live (30 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

const KEY_SEPARATOR: &str = "###";

/// Build a cache key of the form `"<kind>###<id>"`.
pub fn cache_key(kind: &str, id: &str) -> String {
    format!("{kind}{KEY_SEPARATOR}{id}")
}

/// Build a cache key of the form `"<kind>###<id>###<language>"` for content
/// that depends on the locale.
pub fn localized_cache_key(kind: &str, id: &str, language: &str) -> String {
    format!("{kind}{KEY_SEPARATOR}{id}{KEY_SEPARATOR}{language}")
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<V> {
    /// Nothing stored under the key, or the entry expired.
    Miss,
    /// A live entry. `Hit(None)` is a remembered empty answer.
    Hit(Option<V>),
}

impl<V> CacheLookup<V> {
    /// Returns `true` for a live entry, including a stored `None`.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// `None` on a miss, `Some(value)` on a hit.
    pub fn into_option(self) -> Option<Option<V>> {
        match self {
            Self::Miss => None,
            Self::Hit(value) => Some(value),
        }
    }
}

/// Narrow get/put contract the engine depends on.
///
/// Any key/value store with TTL and capacity semantics can stand in for
/// [`IdentityCache`].
pub trait CacheStore<V>: Send + Sync {
    /// Read the entry stored under `key`.
    fn get(&self, key: &str) -> CacheLookup<V>;

    /// Store `value` under `key`, replacing any previous entry.
    fn put(&self, key: String, value: Option<V>);
}

/// Entry in the identity cache.
struct CacheEntry<V> {
    value: Option<V>,
    stored_at: Instant,
}

/// Thread-safe TTL + LRU cache.
pub struct IdentityCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> IdentityCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1) for `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Read an entry, marking it most recently used.
    ///
    /// Expired entries are dropped and reported as [`CacheLookup::Miss`].
    pub fn get(&self, key: &str) -> CacheLookup<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return CacheLookup::Miss,
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return CacheLookup::Hit(entry.value.clone());
            }
            Some(_) => true,
        };
        if expired {
            entries.pop(key);
        }
        CacheLookup::Miss
    }

    /// Store `value` under `key`. Last write wins; the TTL restarts.
    ///
    /// When the cache is full, expired entries are dropped before the least
    /// recently used live entry is evicted.
    pub fn put(&self, key: impl Into<String>, value: Option<V>) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        let mut entries = self.entries.lock();
        if entries.len() >= entries.cap().get() && !entries.contains(&key) {
            self.purge_expired(&mut entries);
        }
        entries.put(key, entry);
    }

    /// Number of stored entries, expired ones included until they are read
    /// or a full cache is written to.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn purge_expired(&self, entries: &mut LruCache<String, CacheEntry<V>>) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.stored_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
    }
}

impl<V: Clone> Default for IdentityCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<V: Clone + Send> CacheStore<V> for IdentityCache<V> {
    fn get(&self, key: &str) -> CacheLookup<V> {
        IdentityCache::get(self, key)
    }

    fn put(&self, key: String, value: Option<V>) {
        IdentityCache::put(self, key, value);
    }
}
