//! Fetch-and-cache coordination
//!
//! [`SnapshotCoordinator::get`] is the single entry point callers use to
//! obtain a [`ChannelSnapshot`]:
//!
//! ```text
//! get(reference, elevated, force_refresh)
//!   ├─ fresh cache entry and !force_refresh ──► cached snapshot (no avatar)
//!   └─ otherwise
//!        ├─ per-key flight lock (concurrent misses share one fetch)
//!        ├─ ChannelSource::fetch_channel (bounded by fetch timeout)
//!        ├─ build_snapshot (metrics engine)
//!        └─ cache insert ──► fresh snapshot (with avatar, if any)
//! ```
//!
//! Every upstream failure (not found, private, transport, timeout) is
//! logged and surfaced as `None`. Failures are never cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use crate::analytics::build_snapshot;
use crate::cache::{CacheKey, SnapshotCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::ChannelSnapshot;
use crate::upstream::ChannelSource;

/// Counters describing coordinator activity since construction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Requests served from cache
    pub cache_hits: u64,
    /// Upstream fetches started
    pub fetches: u64,
    /// Fetches that returned no snapshot
    pub failures: u64,
}

#[derive(Default)]
struct StatCounters {
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

/// Serves channel snapshots from cache or upstream.
pub struct SnapshotCoordinator {
    source: Arc<dyn ChannelSource>,
    cache: SnapshotCache,
    fetch_timeout: Duration,
    /// One lock per key with a fetch in progress
    flights: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
    counters: StatCounters,
}

impl SnapshotCoordinator {
    pub fn new(source: Arc<dyn ChannelSource>, cache: SnapshotCache, fetch_timeout: Duration) -> Self {
        Self {
            source,
            cache,
            fetch_timeout,
            flights: Mutex::new(HashMap::new()),
            counters: StatCounters::default(),
        }
    }

    /// Coordinator with cache and timeout settings taken from `config`.
    pub fn from_config(source: Arc<dyn ChannelSource>, config: &Config) -> Self {
        Self::new(
            source,
            SnapshotCache::from_config(&config.cache),
            config.upstream.timeout(),
        )
    }

    /// Snapshot for `reference`, or `None` if the channel is unavailable.
    ///
    /// Cached snapshots are returned while fresh unless `force_refresh` is
    /// set. Snapshots replayed from cache never carry an avatar path.
    pub async fn get(
        &self,
        reference: &str,
        elevated: bool,
        force_refresh: bool,
    ) -> Option<ChannelSnapshot> {
        let key = CacheKey::new(reference, elevated);

        if !force_refresh {
            if let Some(snapshot) = self.cached(&key) {
                return Some(snapshot);
            }
        }

        let flight = self.flight_lock(&key);
        let guard = flight.lock().await;

        // Another caller may have filled the entry while we waited
        let cached = if force_refresh {
            None
        } else {
            self.cached(&key)
        };
        let result = match cached {
            Some(snapshot) => Some(snapshot),
            None => self.fetch_and_store(&key).await,
        };

        drop(guard);
        self.release_flight(&key, &flight);
        result
    }

    /// Activity counters.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Number of cache entries, fresh or stale.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, key: &CacheKey) -> Option<ChannelSnapshot> {
        let snapshot = self.cache.get(key)?;
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            reference = %key.reference,
            elevated = key.elevated,
            "Serving snapshot from cache"
        );
        Some(snapshot)
    }

    async fn fetch_and_store(&self, key: &CacheKey) -> Option<ChannelSnapshot> {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            reference = %key.reference,
            elevated = key.elevated,
            source = self.source.name(),
            "Fetching channel from upstream"
        );

        let start = Instant::now();
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.source.fetch_channel(&key.reference, key.elevated),
        )
        .await
        .unwrap_or_else(|_| Err(Error::Timeout(self.fetch_timeout.as_secs())));

        let data = match fetched {
            Ok(data) => data,
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                if e.is_not_found() {
                    tracing::info!(reference = %key.reference, error = %e, "Channel unavailable");
                } else {
                    tracing::warn!(reference = %key.reference, error = %e, "Upstream fetch failed");
                }
                return None;
            }
        };

        let message_count = data.messages.len();
        let snapshot = build_snapshot(&key.reference, data, key.elevated, Utc::now());
        self.cache.insert(key.clone(), &snapshot);

        tracing::info!(
            reference = %key.reference,
            elevated = key.elevated,
            messages = message_count,
            subscribers = snapshot.subscribers,
            duration_ms = start.elapsed().as_millis() as u64,
            "Channel snapshot refreshed"
        );

        Some(snapshot)
    }

    fn flight_lock(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
        match self.flights.lock() {
            Ok(mut flights) => flights.entry(key.clone()).or_default().clone(),
            // Without the shared table, fall back to an unshared lock
            Err(_) => Arc::new(AsyncMutex::new(())),
        }
    }

    fn release_flight(&self, key: &CacheKey, flight: &Arc<AsyncMutex<()>>) {
        let Ok(mut flights) = self.flights.lock() else {
            return;
        };
        if let Some(current) = flights.get(key) {
            // Only the table and this caller hold it: nobody is waiting
            if Arc::ptr_eq(current, flight) && Arc::strong_count(flight) == 2 {
                flights.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.flights.lock().map(|f| f.len()).unwrap_or(0)
    }
}

/// Blocking wrapper for [`SnapshotCoordinator`]
///
/// Provides blocking methods for use in synchronous code.
pub struct BlockingCoordinator {
    inner: SnapshotCoordinator,
    runtime: tokio::runtime::Runtime,
}

impl BlockingCoordinator {
    pub fn new(inner: SnapshotCoordinator) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { inner, runtime })
    }

    /// Blocking [`SnapshotCoordinator::get`].
    pub fn get(
        &self,
        reference: &str,
        elevated: bool,
        force_refresh: bool,
    ) -> Option<ChannelSnapshot> {
        self.runtime
            .block_on(self.inner.get(reference, elevated, force_refresh))
    }

    /// Run an async operation against the coordinator to completion.
    pub fn block_on<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a SnapshotCoordinator) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        self.runtime.block_on(f(&self.inner))
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.inner.stats()
    }
}
