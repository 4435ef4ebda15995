// Nearby-postbox lookup cache.
// A single postcode-keyed JSON file behind one mutex; every read-modify-write
// of the file happens inside the lock so concurrent fetches for different
// postcodes cannot lose each other's entries.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::lookup::types::RawPostbox;

/// How long a cached lookup result stays trusted. Tuned against observed
/// volatility of the lookup service's data, not from first principles.
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// One cached lookup result for a postcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEntry {
    /// Epoch time in seconds.
    pub last_fetch: i64,
    pub postboxes: Vec<RawPostbox>,
}

impl CachedEntry {
    fn is_fresh(&self, ttl: Duration, now: i64) -> bool {
        self.last_fetch + ttl.as_secs() as i64 > now
    }
}

/// TTL-bounded cache of per-postcode lookup results, shared across
/// concurrent fetches.
#[derive(Debug)]
pub struct NearbyCache {
    path: PathBuf,
    ttl: Duration,
    // One lock for the whole file, not per postcode. Cache operations are
    // infrequent and brief, so coarse contention is fine for a
    // single-device client.
    lock: Mutex<()>,
}

impl NearbyCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: CACHE_TTL,
            lock: Mutex::new(()),
        }
    }

    /// Override the TTL (tests).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Look up cached results for a postcode. Stale entries count as a miss
    /// but are not deleted here; `sweep_expired` handles removal so the hot
    /// path stays a single read.
    pub async fn lookup(&self, postcode: &str) -> Option<Vec<RawPostbox>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await;

        let entry = map.get(postcode)?;
        if !entry.is_fresh(self.ttl, Utc::now().timestamp()) {
            info!("cached data expired for {postcode}");
            return None;
        }
        info!("using cached data for {postcode}");
        Some(entry.postboxes.clone())
    }

    /// Merge a fresh lookup result into the cache file. The file is re-read
    /// inside the lock rather than trusting any in-memory copy, so entries
    /// written by concurrent fetches for other postcodes survive.
    pub async fn store(&self, postcode: &str, postboxes: &[RawPostbox]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await;

        map.insert(
            postcode.to_string(),
            CachedEntry {
                last_fetch: Utc::now().timestamp(),
                postboxes: postboxes.to_vec(),
            },
        );
        self.write_map(&map).await?;
        info!("cached new entry for {postcode}");
        Ok(())
    }

    /// Delete the cache file outright. Returns whether a file was removed.
    /// Wired to the user-facing "clear cache" action.
    pub async fn clear(&self) -> Result<bool> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every expired entry, writing back only if anything changed.
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await;
        if map.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().timestamp();
        let before = map.len();
        map.retain(|_, entry| entry.is_fresh(self.ttl, now));
        let removed = before - map.len();

        if removed > 0 {
            self.write_map(&map).await?;
        }
        info!("removed {removed} stale cache entries");
        Ok(removed)
    }

    /// Run `sweep_expired` as a best-effort background task at process
    /// start. Never blocks foreground work; failures are logged.
    pub fn sweep_in_background(self: std::sync::Arc<Self>) {
        tokio::spawn(async move {
            if let Err(e) = self.sweep_expired().await {
                warn!("cache sweep failed: {e}");
            }
        });
    }

    // Callers must hold the lock.
    async fn read_map(&self) -> BTreeMap<String, CachedEntry> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!("failed to read cache file: {e}");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(map) => map,
            Err(e) => {
                warn!("failed to parse existing cache data: {e}");
                BTreeMap::new()
            }
        }
    }

    // Callers must hold the lock. Atomic via temp file + rename.
    async fn write_map(&self, map: &BTreeMap<String, CachedEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(map)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
