//! Point-in-time telemetry snapshot.

use std::fmt;
use std::time::Duration;

/// An immutable copy of [`StreamMetrics`](super::StreamMetrics).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub uptime: Duration,

    // === Cycles ===
    pub cycles_started: u64,
    /// Cycles that reconciled without a layer failure
    pub cycles_completed: u64,
    /// Cycles that reconciled after a layer failure
    pub cycles_failed: u64,
    pub cycles_preempted: u64,
    pub cycles_skipped: u64,
    /// Mean wall time of reconciled cycles
    pub average_cycle_time: Duration,

    // === Tiles ===
    pub tiles_added: u64,
    pub tiles_removed: u64,
    /// Channel writes accepted by a tile
    pub tiles_updated: u64,
    pub tiles_live: usize,

    // === Layers ===
    pub layer_failures: u64,
}

impl TelemetrySnapshot {
    /// Fraction of started cycles that were preempted.
    pub fn preemption_rate(&self) -> f64 {
        if self.cycles_started == 0 {
            0.0
        } else {
            self.cycles_preempted as f64 / self.cycles_started as f64
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Uptime:          {:.1}s", self.uptime.as_secs_f64())?;
        writeln!(
            f,
            "Cycles:          {} started, {} completed, {} failed, {} preempted, {} skipped",
            self.cycles_started,
            self.cycles_completed,
            self.cycles_failed,
            self.cycles_preempted,
            self.cycles_skipped
        )?;
        writeln!(
            f,
            "Cycle time:      {:.1} ms avg",
            self.average_cycle_time.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "Tiles:           {} live, {} added, {} removed, {} updates",
            self.tiles_live, self.tiles_added, self.tiles_removed, self.tiles_updated
        )?;
        write!(f, "Layer failures:  {}", self.layer_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preemption_rate() {
        let snapshot = TelemetrySnapshot {
            cycles_started: 4,
            cycles_preempted: 1,
            ..Default::default()
        };
        assert_eq!(snapshot.preemption_rate(), 0.25);
        assert_eq!(TelemetrySnapshot::default().preemption_rate(), 0.0);
    }

    #[test]
    fn test_display_lists_failures() {
        let snapshot = TelemetrySnapshot {
            layer_failures: 3,
            ..Default::default()
        };
        assert!(snapshot.to_string().contains("Layer failures:  3"));
    }
}
