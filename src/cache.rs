// In-memory key-value store with per-entry TTL, lazy eviction on read, and a
// background sweep with an explicit start/stop lifecycle.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Builds a deterministic cache key from a logical prefix and ordered parts,
/// so identical requests collide and differing requests never do.
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
    format!("{prefix}:{}", parts.join(":"))
}

struct CacheEntry<T> {
    value: T,
    expires_at_epoch_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub valid_entries: usize,
}

/// Generic TTL cache. The map is the only shared mutable state in the crate;
/// a mutex with short critical sections keeps `get`/`set`/`cleanup`
/// linearizable, so a value and its expiry are never observed torn.
pub struct TtlCache<T> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<T>>>>,
    sweep: Mutex<Option<CancellationToken>>,
}

impl<T: Clone + Send + 'static> TtlCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            sweep: Mutex::new(None),
        }
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Stores `value` under `key` for `ttl`. Overwrites unconditionally;
    /// last writer wins.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let expires_at_epoch_ms = Self::now_ms() + ttl.as_millis() as i64;
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at_epoch_ms,
            },
        );
    }

    /// Returns the stored value while it is still live. An expired entry
    /// discovered here is removed on the spot and reads as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if Self::now_ms() < entry.expires_at_epoch_ms => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry whose expiry has passed and returns the count.
    /// Used by the background sweep and available for manual invocation.
    pub fn cleanup(&self) -> usize {
        Self::cleanup_entries(&self.entries)
    }

    fn cleanup_entries(entries: &Mutex<HashMap<String, CacheEntry<T>>>) -> usize {
        let now = Self::now_ms();
        let mut entries = entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at_epoch_ms);
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Self::now_ms();
        let entries = self.entries.lock().expect("cache lock poisoned");
        let expired_entries = entries
            .values()
            .filter(|entry| now >= entry.expires_at_epoch_ms)
            .count();
        CacheStats {
            total_entries: entries.len(),
            expired_entries,
            valid_entries: entries.len() - expired_entries,
        }
    }

    /// Spawns the periodic sweep so memory cannot grow unbounded between
    /// reads. A second call while a sweep is running is a no-op; the sweep is
    /// only ever started here, never restarted implicitly.
    pub fn start_sweep(&self, interval: Duration) {
        let mut sweep = self.sweep.lock().expect("sweep lock poisoned");
        if sweep.is_some() {
            debug!("Cache sweep already running, ignoring start request");
            return;
        }

        let token = CancellationToken::new();
        sweep.replace(token.clone());

        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick resolves immediately; skip it so the first sweep
            // happens one full interval after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Cache sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = Self::cleanup_entries(&entries);
                        if removed > 0 {
                            debug!(removed, "Cache sweep evicted expired entries");
                        }
                    }
                }
            }
        });
    }

    /// Stops the background sweep. Idempotent; calls after the first are
    /// no-ops.
    pub fn stop_sweep(&self) {
        let mut sweep = self.sweep.lock().expect("sweep lock poisoned");
        if let Some(token) = sweep.take() {
            token.cancel();
        }
    }
}

impl<T: Clone + Send + 'static> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TtlCache<T> {
    fn drop(&mut self) {
        if let Ok(mut sweep) = self.sweep.lock() {
            if let Some(token) = sweep.take() {
                token.cancel();
            }
        }
    }
}
