//! Lock-free atomic metrics collection.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::TelemetrySnapshot;

/// Counters for the update cycle and tile lifecycle.
///
/// All updates use relaxed ordering; snapshots are not required to be
/// consistent across counters.
#[derive(Debug)]
pub struct StreamMetrics {
    start_time: Instant,

    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    cycles_preempted: AtomicU64,
    cycles_skipped: AtomicU64,
    cycle_time_us: AtomicU64,

    tiles_added: AtomicU64,
    tiles_removed: AtomicU64,
    tiles_updated: AtomicU64,
    tiles_live: AtomicUsize,

    layer_failures: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles_started: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            cycles_preempted: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            cycle_time_us: AtomicU64::new(0),
            tiles_added: AtomicU64::new(0),
            tiles_removed: AtomicU64::new(0),
            tiles_updated: AtomicU64::new(0),
            tiles_live: AtomicUsize::new(0),
            layer_failures: AtomicU64::new(0),
        }
    }

    // === Cycles ===

    pub fn cycle_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A cycle reconciled. `failed` marks cycles that ended on a layer
    /// failure.
    pub fn cycle_completed(&self, elapsed: Duration, failed: bool) {
        if failed {
            self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        }
        self.cycle_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn cycle_preempted(&self) {
        self.cycles_preempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_skipped(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    // === Tiles ===

    pub fn tile_added(&self) {
        self.tiles_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_removed(&self) {
        self.tiles_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_updated(&self) {
        self.tiles_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_tiles_live(&self, count: usize) {
        self.tiles_live.store(count, Ordering::Relaxed);
    }

    // === Layers ===

    pub fn layer_failed(&self) {
        self.layer_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let uptime = self.start_time.elapsed();
        let completed = self.cycles_completed.load(Ordering::Relaxed);
        let failed = self.cycles_failed.load(Ordering::Relaxed);
        let reconciled = completed + failed;
        let average_cycle_time = if reconciled == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.cycle_time_us.load(Ordering::Relaxed) / reconciled)
        };

        TelemetrySnapshot {
            uptime,
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: completed,
            cycles_failed: failed,
            cycles_preempted: self.cycles_preempted.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            average_cycle_time,
            tiles_added: self.tiles_added.load(Ordering::Relaxed),
            tiles_removed: self.tiles_removed.load(Ordering::Relaxed),
            tiles_updated: self.tiles_updated.load(Ordering::Relaxed),
            tiles_live: self.tiles_live.load(Ordering::Relaxed),
            layer_failures: self.layer_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}
