//! Atomic counters for evaluator and sketch observability.
//!
//! All counters use relaxed ordering; they are advisory/diagnostic,
//! not synchronization primitives. Each evaluator and each sketch owns its
//! own counters, so independent instances never share state.

use std::sync::atomic::{AtomicU64, Ordering};

/// Increment a counter by 1.
pub fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Increment a counter by `n`.
pub fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

/// Read a counter value.
pub fn get(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

/// Counters for one [`crate::QuorumSafezone`].
#[derive(Debug)]
pub struct SafezoneMetrics {
    /// Calls to `prepare`, successful or not.
    pub prepares: AtomicU64,
    /// `prepare` calls rejected as non-admissible.
    pub rejected_references: AtomicU64,
    /// Total `evaluate` calls.
    pub evaluations: AtomicU64,
    /// Evaluations that used the normalized formula.
    pub eikonal_evaluations: AtomicU64,
    /// Evaluations that used the raw formula.
    pub raw_evaluations: AtomicU64,
    /// Times the squared-reference cache was (re)built.
    pub cache_builds: AtomicU64,
    /// Complete subsets scored by the normalized enumeration.
    pub subsets_enumerated: AtomicU64,
}

impl SafezoneMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prepares: AtomicU64::new(0),
            rejected_references: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
            eikonal_evaluations: AtomicU64::new(0),
            raw_evaluations: AtomicU64::new(0),
            cache_builds: AtomicU64::new(0),
            subsets_enumerated: AtomicU64::new(0),
        }
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> SafezoneMetricsSnapshot {
        SafezoneMetricsSnapshot {
            prepares: get(&self.prepares),
            rejected_references: get(&self.rejected_references),
            evaluations: get(&self.evaluations),
            eikonal_evaluations: get(&self.eikonal_evaluations),
            raw_evaluations: get(&self.raw_evaluations),
            cache_builds: get(&self.cache_builds),
            subsets_enumerated: get(&self.subsets_enumerated),
        }
    }
}

impl Default for SafezoneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of [`SafezoneMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SafezoneMetricsSnapshot {
    pub prepares: u64,
    pub rejected_references: u64,
    pub evaluations: u64,
    pub eikonal_evaluations: u64,
    pub raw_evaluations: u64,
    pub cache_builds: u64,
    pub subsets_enumerated: u64,
}

/// Counters for one [`crate::AgmsSketch`].
#[derive(Debug)]
pub struct SketchMetrics {
    /// Stream updates applied.
    pub updates: AtomicU64,
    /// Whole-column overwrites.
    pub column_writes: AtomicU64,
}

impl SketchMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            updates: AtomicU64::new(0),
            column_writes: AtomicU64::new(0),
        }
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> SketchMetricsSnapshot {
        SketchMetricsSnapshot {
            updates: get(&self.updates),
            column_writes: get(&self.column_writes),
        }
    }
}

impl Default for SketchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SketchMetrics {
    fn clone(&self) -> Self {
        let snap = self.snapshot();
        Self {
            updates: AtomicU64::new(snap.updates),
            column_writes: AtomicU64::new(snap.column_writes),
        }
    }
}

/// Point-in-time snapshot of [`SketchMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SketchMetricsSnapshot {
    pub updates: u64,
    pub column_writes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        assert_eq!(SafezoneMetrics::new().snapshot(), SafezoneMetricsSnapshot::default());
        assert_eq!(SketchMetrics::new().snapshot(), SketchMetricsSnapshot::default());
    }

    #[test]
    fn increment_works() {
        let m = SafezoneMetrics::new();
        inc(&m.evaluations);
        inc(&m.evaluations);
        add(&m.subsets_enumerated, 10);
        let snap = m.snapshot();
        assert_eq!(snap.evaluations, 2);
        assert_eq!(snap.subsets_enumerated, 10);
        assert_eq!(snap.cache_builds, 0);
    }

    #[test]
    fn cloned_sketch_metrics_are_independent() {
        let m = SketchMetrics::new();
        inc(&m.updates);
        let copy = m.clone();
        inc(&m.updates);
        assert_eq!(copy.snapshot().updates, 1);
        assert_eq!(m.snapshot().updates, 2);
    }
}
