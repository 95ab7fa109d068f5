//! Streaming telemetry.
//!
//! Lock-free counters updated by the orchestrator, copied into a
//! [`TelemetrySnapshot`] for display.
//!
//! ```text
//! UpdateOrchestrator ─────► StreamMetrics ─────► TelemetrySnapshot ─────► CLI
//!                           (atomic counters)    (point-in-time copy)
//! ```

mod metrics;
mod snapshot;

pub use metrics::StreamMetrics;
pub use snapshot::TelemetrySnapshot;
