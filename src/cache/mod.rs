//! Time-bounded caches shared between concurrent relay requests.
//!
//! Values are replaced atomically, never merged. Reads never block on a refresh in progress;
//! refreshes of the same key are serialized so concurrent callers that observe a stale entry share
//! a single fetch, and its outcome.

use dashmap::DashMap;
use std::{
    fmt,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::trace;

/// A cached value and the time it was stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cached<V> {
    /// The cached value.
    pub value: V,
    /// When the value was fetched.
    pub fetched_at: Instant,
}

impl<V> Cached<V> {
    /// Whether the value is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Refresh state of a single key.
#[derive(Debug)]
struct Flight<E> {
    /// Number of refreshes that completed, successful or not.
    completed: AtomicU64,
    /// Held while a refresh runs. Holds the error of the last refresh if it failed.
    last_error: Mutex<Option<E>>,
}

impl<E> Default for Flight<E> {
    fn default() -> Self {
        Self { completed: AtomicU64::new(0), last_error: Mutex::new(None) }
    }
}

/// A concurrent cache with a fixed time-to-live and single-flight refreshes.
pub struct TtlCache<K, V, E> {
    /// Name used in logs.
    name: &'static str,
    /// How long an entry is considered fresh.
    ttl: Duration,
    /// Last fetched value per key, including stale ones.
    entries: DashMap<K, Cached<V>>,
    /// Per-key refresh state.
    flights: DashMap<K, Arc<Flight<E>>>,
}

impl<K: Eq + Hash, V, E> fmt::Debug for TtlCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<K, V, E> TtlCache<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
    E: Clone,
{
    /// Creates an empty cache.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self { name, ttl, entries: DashMap::new(), flights: DashMap::new() }
    }

    /// Returns the time-to-live of the cache.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `key` if it is still fresh.
    pub fn get_fresh(&self, key: &K) -> Option<Cached<V>> {
        self.entries.get(key).map(|entry| entry.clone()).filter(|entry| entry.is_fresh(self.ttl))
    }

    /// Returns the last entry stored for `key`, however old.
    pub fn get_any(&self, key: &K) -> Option<Cached<V>> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Replaces the entry for `key`.
    pub fn insert(&self, key: K, value: V) -> Cached<V> {
        let cached = Cached { value, fetched_at: Instant::now() };
        self.entries.insert(key, cached.clone());
        cached
    }

    /// Returns the fresh entry for `key`, or refreshes it with `fetch`.
    ///
    /// Only one refresh per key runs at a time. Callers that queued behind a refresh share its
    /// outcome: the value it stored, or the error it failed with. They never fetch again.
    ///
    /// The boolean is `true` if this call performed the fetch. Fetch errors leave the previous
    /// entry in place.
    pub async fn get_or_refresh<F, Fut>(&self, key: &K, fetch: F) -> Result<(Cached<V>, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(cached) = self.get_fresh(key) {
            trace!(cache = self.name, ?key, "Cache hit");
            return Ok((cached, false));
        }

        // Clone the state out of the map so the shard is not held across the await below.
        let flight = {
            let entry = self.flights.entry(key.clone()).or_default();
            Arc::clone(entry.value())
        };
        let observed = flight.completed.load(Ordering::Acquire);
        let mut last_error = flight.last_error.lock().await;

        if flight.completed.load(Ordering::Acquire) != observed {
            if let Some(err) = last_error.as_ref() {
                trace!(cache = self.name, ?key, "Concurrent refresh failed");
                return Err(err.clone());
            }
            if let Some(cached) = self.get_any(key) {
                trace!(cache = self.name, ?key, "Cache refreshed by concurrent caller");
                return Ok((cached, false));
            }
        } else if let Some(cached) = self.get_fresh(key) {
            return Ok((cached, false));
        }

        trace!(cache = self.name, ?key, "Cache miss, refreshing");
        let result = fetch().await;
        *last_error = result.as_ref().err().cloned();
        flight.completed.fetch_add(1, Ordering::Release);

        Ok((self.insert(key.clone(), result?), true))
    }

    /// Number of entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
