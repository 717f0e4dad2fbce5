//! Timestamped snapshot cache.
//!
//! Entries are keyed by `(reference, elevated)` so free and elevated
//! snapshots never share an entry. An entry is replaced wholesale on every
//! successful fetch and never mutated in place.
//!
//! Timestamps use [`tokio::time::Instant`] so tests can drive expiry with a
//! paused clock.

use crate::config::CacheConfig;
use crate::types::ChannelSnapshot;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Cache key: the caller's channel reference plus the elevated flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub reference: String,
    pub elevated: bool,
}

impl CacheKey {
    pub fn new(reference: &str, elevated: bool) -> Self {
        Self {
            reference: reference.trim().to_string(),
            elevated,
        }
    }
}

struct CacheEntry {
    inserted_at: Instant,
    snapshot: ChannelSnapshot,
}

/// In-memory snapshot cache with a fixed freshness window.
pub struct SnapshotCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh snapshot for `key`, if any.
    ///
    /// Returned snapshots never reference an avatar file.
    pub fn get(&self, key: &CacheKey) -> Option<ChannelSnapshot> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(entry.snapshot.without_avatar())
        } else {
            None
        }
    }

    /// Store `snapshot` under `key`, replacing any previous entry.
    pub fn insert(&self, key: CacheKey, snapshot: &ChannelSnapshot) {
        if self.ttl.is_zero() {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!("Snapshot cache lock poisoned; skipping insert");
            return;
        };

        if entries.len() >= self.max_entries {
            let before = entries.len();
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
            tracing::debug!(
                removed = before - entries.len(),
                remaining = entries.len(),
                "Swept expired snapshot cache entries"
            );
        }

        // The avatar file belongs to the caller of the fresh fetch
        entries.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                snapshot: snapshot.without_avatar(),
            },
        );
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
