//! Snapshot stores keyed by coin and currency
//!
//! `FileCache` keeps one JSON file per pair and derives the age of an entry from the
//! file's modification time. `MemoryCache` has the same contract without touching disk.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::market::Snapshot;

/// Default cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Builds the cache key for a coin/currency pair
pub fn cache_key(coin_id: &str, currency: &str) -> String {
    format!("{}_{}", coin_id, currency)
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug, Clone, PartialEq)]
pub struct CachedData {
    /// The cached snapshot
    pub data: Snapshot,
    /// When the snapshot was stored
    pub cached_at: DateTime<Utc>,
    /// Whether the entry is at least `ttl` old
    pub is_expired: bool,
}

/// Storage for the last successful snapshot of each pair
pub trait SnapshotCache {
    /// Reads the entry for `key`, marking it expired once its age reaches `ttl`
    ///
    /// Returns `None` when the entry is absent or cannot be used as a snapshot.
    fn read(&self, key: &str, ttl: Duration) -> Option<CachedData>;

    /// Stores `snapshot` under `key`, replacing any previous entry
    fn write(&self, key: &str, snapshot: &Snapshot) -> io::Result<()>;
}

/// Age of an entry stored at `stored_at`; timestamps in the future count as zero
fn age_of(stored_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(stored_at).unwrap_or(Duration::ZERO)
}

/// Stores snapshots as pretty-printed JSON files in a directory
#[derive(Debug, Clone)]
pub struct FileCache {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl Default for FileCache {
    fn default() -> Self {
        Self::with_dir(PathBuf::from(DEFAULT_CACHE_DIR))
    }
}

impl FileCache {
    /// Creates a FileCache rooted at `cache_dir`
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the path to a cache file for the given key
    pub fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }
}

impl SnapshotCache for FileCache {
    fn read(&self, key: &str, ttl: Duration) -> Option<CachedData> {
        let path = self.cache_path(key);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let content = fs::read_to_string(&path).ok()?;

        let data = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                debug!(path = %path.display(), "cache file is not a JSON object, ignoring");
                return None;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unreadable cache file, ignoring");
                return None;
            }
        };

        Some(CachedData {
            data,
            cached_at: DateTime::<Utc>::from(modified),
            is_expired: age_of(modified, SystemTime::now()) >= ttl,
        })
    }

    fn write(&self, key: &str, snapshot: &Snapshot) -> io::Result<()> {
        self.ensure_dir()?;

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        fs::write(self.cache_path(key), json)
    }
}

/// In-process snapshot store, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Snapshot, SystemTime)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the map; a panic in another holder leaves it usable since every update is a
    /// single insert
    fn entries(&self) -> MutexGuard<'_, HashMap<String, (Snapshot, SystemTime)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts an entry with an explicit storage time
    pub fn insert_at(&self, key: &str, snapshot: Snapshot, stored_at: SystemTime) {
        self.entries().insert(key.to_string(), (snapshot, stored_at));
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotCache for MemoryCache {
    fn read(&self, key: &str, ttl: Duration) -> Option<CachedData> {
        let entries = self.entries();
        let (data, stored_at) = entries.get(key)?;

        Some(CachedData {
            data: data.clone(),
            cached_at: DateTime::<Utc>::from(*stored_at),
            is_expired: age_of(*stored_at, SystemTime::now()) >= ttl,
        })
    }

    fn write(&self, key: &str, snapshot: &Snapshot) -> io::Result<()> {
        self.entries()
            .insert(key.to_string(), (snapshot.clone(), SystemTime::now()));
        Ok(())
    }
}
