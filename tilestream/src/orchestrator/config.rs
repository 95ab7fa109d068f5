//! Orchestrator configuration.

use std::time::Duration;

use crate::segmentation::SegmentationConfig;

/// Request area half size per metre of height above ground.
pub const DEFAULT_SIZE_MULTIPLIER: f64 = 4.0;

/// Smallest request area half size in metres.
pub const DEFAULT_MIN_SIZE_M: f64 = 2_000.0;

/// Viewpoint movement below this many metres does not start a cycle.
pub const DEFAULT_MOVEMENT_EPSILON_M: f64 = 1.0;

/// Viewpoint rotation below this many radians does not start a cycle.
pub const MIN_TURN_RAD: f64 = 1e-3;

pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(300);

/// Buffered [`StreamEvent`](super::StreamEvent)s per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub segmentation: SegmentationConfig,
    pub size_multiplier: f64,
    pub min_size_m: f64,
    pub movement_epsilon_m: f64,
    pub fade_duration: Duration,
    pub event_capacity: usize,
}

impl OrchestratorConfig {
    /// Half size of the request area for a viewer `height` metres above
    /// ground.
    pub fn request_half_size(&self, height: f64) -> f64 {
        (height.max(0.0) * self.size_multiplier).max(self.min_size_m)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            size_multiplier: DEFAULT_SIZE_MULTIPLIER,
            min_size_m: DEFAULT_MIN_SIZE_M,
            movement_epsilon_m: DEFAULT_MOVEMENT_EPSILON_M,
            fade_duration: DEFAULT_FADE_DURATION,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
