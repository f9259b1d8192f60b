//! Named asynchronous locks.
//!
//! Two tiers: a short synchronous critical section protects the map itself and
//! is held only long enough to look up or insert an entry; the per-key async
//! mutexes guard the callers' actual work. Entries are never removed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held while the caller owns the key. Releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller holds `key`, then hold it until the guard drops.
    pub async fn acquire(&self, key: &str) -> LockGuard {
        let lock = self.entry(key);
        debug!("Waiting for lock {}", key);
        let guard = lock.lock_owned().await;
        debug!("Acquired lock {}", key);
        LockGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Number of keys ever acquired.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
