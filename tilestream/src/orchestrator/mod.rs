//! Viewpoint-driven tile update orchestration
//!
//! Each call to [`UpdateOrchestrator::update`] segments the area around the
//! viewpoint, makes sure every target tile has a running request against
//! the current layers, waits for the requests to settle and then prunes
//! tiles that are no longer targeted. A newer cycle preempts an older one.

mod config;
mod types;
mod update;

pub use config::{
    OrchestratorConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_FADE_DURATION, DEFAULT_MIN_SIZE_M,
    DEFAULT_MOVEMENT_EPSILON_M, DEFAULT_SIZE_MULTIPLIER, MIN_TURN_RAD,
};
pub use types::{CycleOutcome, StreamEvent};
pub use update::UpdateOrchestrator;
