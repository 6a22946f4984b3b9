use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    stored_at: Instant,
}

impl<T> Entry<T> {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Single-slot cache. Stale entries are kept so callers can fall back to
/// them when the upstream is rate limiting or down. Callers pass `now` so
/// tests control the clock.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: RwLock<Option<Entry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub async fn fresh(&self, now: Instant) -> Option<T> {
        let guard = self.entry.read().await;
        guard
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.value.clone())
    }

    /// Last stored value regardless of age.
    pub async fn last(&self) -> Option<T> {
        self.entry.read().await.as_ref().map(|entry| entry.value.clone())
    }

    pub async fn store(&self, value: T, now: Instant) {
        *self.entry.write().await = Some(Entry {
            value,
            stored_at: now,
        });
    }
}

/// Keyed variant used for series that differ only by query window.
#[derive(Debug)]
pub struct TtlMap<K, T> {
    ttl: Duration,
    entries: RwLock<HashMap<K, Entry<T>>>,
}

impl<K: Eq + Hash, T: Clone> TtlMap<K, T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn fresh(&self, key: &K, now: Instant) -> Option<T> {
        let guard = self.entries.read().await;
        guard
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.value.clone())
    }

    pub async fn store(&self, key: K, value: T, now: Instant) {
        let mut guard = self.entries.write().await;
        guard.retain(|_, entry| entry.is_fresh(self.ttl, now));
        guard.insert(
            key,
            Entry {
                value,
                stored_at: now,
            },
        );
    }
}
