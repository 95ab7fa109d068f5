//! Default values for every configuration key.

use std::time::Duration;

use crate::orchestrator::{
    DEFAULT_FADE_DURATION, DEFAULT_MIN_SIZE_M, DEFAULT_MOVEMENT_EPSILON_M, DEFAULT_SIZE_MULTIPLIER,
};

// =============================================================================
// [stream]
// =============================================================================

pub const DEFAULT_STREAM_SIZE_MULTIPLIER: f64 = DEFAULT_SIZE_MULTIPLIER;
pub const DEFAULT_STREAM_MIN_SIZE_M: f64 = DEFAULT_MIN_SIZE_M;
pub const DEFAULT_ZOOM_MIN: u8 = 2;
pub const DEFAULT_ZOOM_MAX: u8 = 19;
pub const DEFAULT_RESOLUTION: f64 = 1.0;
pub const DEFAULT_TILE_COUNT_MIN: usize = 16;
pub const DEFAULT_TILE_COUNT_MAX: usize = 64;
pub const DEFAULT_CULLING: bool = false;

/// Full view cone angle in degrees.
pub const DEFAULT_CULLING_ANGLE: f64 = 90.0;

pub const DEFAULT_STREAM_FADE_DURATION: Duration = DEFAULT_FADE_DURATION;
pub const DEFAULT_STREAM_MOVEMENT_EPSILON_M: f64 = DEFAULT_MOVEMENT_EPSILON_M;
pub const DEFAULT_REFINE_INSIDE_AREA_ONLY: bool = true;
pub const DEFAULT_HTTP_TIMEOUT: Duration = crate::provider::DEFAULT_TIMEOUT;

// =============================================================================
// [layer.<name>]
// =============================================================================

/// Mesh vertices per side for terrain layers.
pub const DEFAULT_MESH_RESOLUTION: usize = 33;

/// Section name prefix of layer sections.
pub const LAYER_SECTION_PREFIX: &str = "layer.";
