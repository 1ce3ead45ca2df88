//! In-memory thumbnail URI cache.
//!
//! Backed by `moka::sync::Cache`, bounded by entry count with optional
//! time-to-idle expiry. Lookups never block the runtime, so the cache is
//! safe to consult from render paths and async tasks alike.
//!
//! # Entry lifecycle
//!
//! ```text
//! (absent) --mark_pending--> Pending --add_to_cache_external--> Ready
//!                               │
//!                               └--mark_error--> Error --mark_pending--> Pending
//! ```
//!
//! Only `Ready` entries count as cached. Transitions that depend on the
//! current entry run through moka's per-key `and_compute_with`, so a
//! concurrent promotion to `Ready` is never overwritten.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::ops::compute::Op;
use moka::sync::Cache;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use super::key::ThumbnailKey;

/// Default maximum number of cached entries.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Minimum age before a read refreshes `last_accessed`.
const ACCESS_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Cache entry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Ready,
    Error,
}

/// A cached thumbnail.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: ThumbnailKey,
    /// Displayable URI; set once the entry is ready.
    pub uri: Option<String>,
    /// On-disk location, when known.
    pub path: Option<PathBuf>,
    pub state: EntryState,
    pub last_accessed: Instant,
}

impl CacheEntry {
    fn pending(key: ThumbnailKey) -> Self {
        Self {
            key,
            uri: None,
            path: None,
            state: EntryState::Pending,
            last_accessed: Instant::now(),
        }
    }
}

/// Configuration for [`ThumbnailCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction.
    pub max_entries: u64,
    /// Evict entries not read for this long.
    pub time_to_idle: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            time_to_idle: None,
        }
    }
}

impl CacheConfig {
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
}

/// Key → URI cache shared by the scheduler and tile loaders.
pub struct ThumbnailCache {
    entries: Cache<ThumbnailKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ThumbnailCache {
    /// Create a cache with the given bounds.
    pub fn new(config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_entries);
        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            entries: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Whether `key` has a ready URI.
    pub fn is_cached(&self, key: &ThumbnailKey) -> bool {
        self.entries
            .get(key)
            .map(|e| e.state == EntryState::Ready)
            .unwrap_or(false)
    }

    /// Ready URI for `key`, refreshing its access time.
    pub fn uri(&self, key: &ThumbnailKey) -> Option<String> {
        let entry = match self.entries.get(key) {
            Some(entry) if entry.state == EntryState::Ready => entry,
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        self.hits.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        if now.duration_since(entry.last_accessed) >= ACCESS_REFRESH_INTERVAL {
            self.entries
                .entry_by_ref(key)
                .and_compute_with(|current| match current {
                    Some(current) if current.value().state == EntryState::Ready => {
                        let mut refreshed = current.into_value();
                        refreshed.last_accessed = now;
                        Op::Put(refreshed)
                    }
                    _ => Op::Nop,
                });
        }
        entry.uri
    }

    /// Full entry for `key`, without touching statistics.
    pub fn entry(&self, key: &ThumbnailKey) -> Option<CacheEntry> {
        self.entries.get(key)
    }

    /// State of `key`, if present.
    pub fn state(&self, key: &ThumbnailKey) -> Option<EntryState> {
        self.entries.get(key).map(|e| e.state)
    }

    /// Promote `key` to ready with a URI obtained outside the generation path
    /// (disk probe hit or completion event).
    pub fn add_to_cache_external(&self, key: ThumbnailKey, uri: String, path: Option<PathBuf>) {
        debug!(key = %key, uri = %uri, "Thumbnail cached");
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                uri: Some(uri),
                path,
                state: EntryState::Ready,
                last_accessed: Instant::now(),
            },
        );
    }

    /// Record that a request for `key` is outstanding. Ready entries are left
    /// untouched.
    pub fn mark_pending(&self, key: &ThumbnailKey) {
        self.replace_unless_ready(key, EntryState::Pending);
    }

    /// Record that generation for `key` failed. Ready entries are left
    /// untouched.
    pub fn mark_error(&self, key: &ThumbnailKey) {
        self.replace_unless_ready(key, EntryState::Error);
    }

    fn replace_unless_ready(&self, key: &ThumbnailKey, state: EntryState) {
        self.entries
            .entry_by_ref(key)
            .and_compute_with(|current| match current {
                Some(current) if current.value().state == EntryState::Ready => Op::Nop,
                _ => {
                    let mut entry = CacheEntry::pending(key.clone());
                    entry.state = state;
                    Op::Put(entry)
                }
            });
    }

    /// Remove a single entry.
    pub fn invalidate(&self, key: &ThumbnailKey) {
        self.entries.invalidate(key);
    }

    /// Remove every entry and reset statistics.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Approximate number of entries (moka is eventually consistent).
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entry_count(),
        }
    }
}
