//! Scheduler counters.
//!
//! ```text
//! RequestScheduler ─────► SchedulerMetrics ─────► SchedulerSnapshot ─────► CLI
//!                         (atomic counters)       (point-in-time copy)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free scheduler counters.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    demands: AtomicU64,
    withdrawn: AtomicU64,
    memory_hits: AtomicU64,
    probe_hits: AtomicU64,
    probe_failures: AtomicU64,
    dispatched: AtomicU64,
    deduplicated: AtomicU64,
    enqueue_failures: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    flushes: AtomicU64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn demanded(&self, count: usize) {
        self.demands.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn withdrawn(&self, count: usize) {
        self.withdrawn.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn probe_hits(&self, count: usize) {
        self.probe_hits.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn probe_failed(&self) {
        self.probe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self, count: usize) {
        self.dispatched.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn deduplicated(&self, count: usize) {
        self.deduplicated.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn enqueue_failed(&self) {
        self.enqueue_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn abandoned(&self, count: usize) {
        self.abandoned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn flushed(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            demands: self.demands.load(Ordering::Relaxed),
            withdrawn: self.withdrawn.load(Ordering::Relaxed),
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            probe_hits: self.probe_hits.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SchedulerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    pub demands: u64,
    pub withdrawn: u64,
    pub memory_hits: u64,
    pub probe_hits: u64,
    pub probe_failures: u64,
    pub dispatched: u64,
    pub deduplicated: u64,
    pub enqueue_failures: u64,
    pub completed: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub flushes: u64,
}

impl SchedulerSnapshot {
    /// Share of demanded keys satisfied without generation.
    pub fn hit_ratio(&self) -> f64 {
        if self.demands == 0 {
            return 0.0;
        }
        (self.memory_hits + self.probe_hits) as f64 / self.demands as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = SchedulerMetrics::new();
        metrics.demanded(10);
        metrics.memory_hit();
        metrics.probe_hits(3);
        metrics.dispatched(6);
        metrics.enqueue_failed();

        let snap = metrics.snapshot();
        assert_eq!(snap.demands, 10);
        assert_eq!(snap.dispatched, 6);
        assert_eq!(snap.enqueue_failures, 1);
        assert!((snap.hit_ratio() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_hit_ratio() {
        assert_eq!(SchedulerSnapshot::default().hit_ratio(), 0.0);
    }
}
