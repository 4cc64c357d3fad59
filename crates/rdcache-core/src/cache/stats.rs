//! Hit and miss accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the backend.
    pub hits: u64,
    /// Reads that found nothing usable.
    pub misses: u64,
    /// Successful writes.
    pub writes: u64,
}

impl CacheStats {
    /// Share of reads that hit, `0.0` before any read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl StatsInner {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        let inner = StatsInner::default();
        inner.hit();
        inner.hit();
        inner.hit();
        inner.miss();
        inner.write();

        let stats = inner.snapshot();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.hit_rate(), 0.75);
    }
}
