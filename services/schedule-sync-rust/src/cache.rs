//! Short-TTL cache of raw upstream responses, keyed by endpoint and sorted
//! query parameters.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheClass {
    Scoreboard,
    Season,
    Schedule,
}

impl CacheClass {
    pub fn ttl(self) -> Duration {
        match self {
            CacheClass::Scoreboard => Duration::from_secs(5 * 60),
            CacheClass::Season => Duration::from_secs(60 * 60),
            CacheClass::Schedule => Duration::from_secs(30 * 60),
        }
    }

    /// Classify an endpoint path. Anything unrecognised gets the shortest TTL.
    pub fn for_endpoint(endpoint: &str) -> Self {
        let endpoint = endpoint.to_ascii_lowercase();
        if endpoint.contains("schedule") || endpoint.contains("calendar") {
            CacheClass::Schedule
        } else if endpoint.contains("season") {
            CacheClass::Season
        } else {
            CacheClass::Scoreboard
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(endpoint: &str, params: &[(String, String)]) -> Self {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        let query = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        Self(format!("{}?{}", endpoint.trim_start_matches('/'), query))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CacheEntry {
    payload: Value,
    class: CacheClass,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.class.ttl()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Owned by one client instance; the mutex makes sharing across tasks safe.
#[derive(Default)]
pub struct ResponseCache {
    inner: Mutex<Inner>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Return a live entry and count a hit. Expired entries are evicted.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let mut inner = self.lock();
        let live = inner
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.payload.clone());
        if live.is_some() {
            inner.hits += 1;
        } else if inner.entries.remove(key).is_some() {
            debug!("Evicted expired cache entry {}", key.as_str());
        }
        live
    }

    /// Store a fresh network payload and count a miss.
    pub fn insert(&self, key: CacheKey, class: CacheClass, payload: Value) {
        let mut inner = self.lock();
        inner.misses += 1;
        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                class,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry past its own class TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.is_live(now));
        let removed = before - inner.entries.len();
        if removed > 0 {
            info!("Purged {} stale cache entries ({} remain)", removed, inner.entries.len());
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}
