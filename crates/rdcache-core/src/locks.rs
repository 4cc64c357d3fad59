//! Per-key mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Table of locks keyed by cache key.
///
/// Entries are created on demand and dropped once no caller holds them.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// Not reentrant: calling it again for the same key from inside `f`
    /// deadlocks.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock();
            f()
        };

        drop(lock);
        self.locks
            .remove_if(key, |_, held| Arc::strong_count(held) == 1);
        result
    }

    /// Number of keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no lock entry is live.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
