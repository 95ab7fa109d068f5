//! Segmentation parameters.

use std::ops::RangeInclusive;

use glam::DVec3;

use crate::coord::PlanarPosition;

/// Distance (metres) at which a tile is refined to zoom 18 at resolution 1.
pub const REFERENCE_DISTANCE_M: f64 = 250.0;

/// Zoom level that corresponds to [`REFERENCE_DISTANCE_M`].
pub const REFERENCE_ZOOM: i32 = 18;

/// Camera-side input to segmentation.
///
/// `position` is in the local frame of the [`LocalProjection`] used by the
/// caller; `forward` uses the same `(east, up, north)` axis layout.
///
/// [`LocalProjection`]: crate::coord::LocalProjection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub position: PlanarPosition,
    pub forward: DVec3,
}

impl Viewpoint {
    pub fn new(position: PlanarPosition, forward: DVec3) -> Self {
        Self { position, forward }
    }

    /// A viewpoint looking straight down.
    pub fn looking_down(position: PlanarPosition) -> Self {
        Self::new(position, DVec3::NEG_Y)
    }

    /// Angle in radians between this viewpoint's forward direction and another's.
    pub fn angle_to(&self, other: &Viewpoint) -> f64 {
        let a = self.forward.normalize_or_zero();
        let b = other.forward.normalize_or_zero();
        if a == DVec3::ZERO || b == DVec3::ZERO {
            return 0.0;
        }
        a.dot(b).clamp(-1.0, 1.0).acos()
    }
}

/// Frustum approximation used for culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingConfig {
    /// Full opening angle of the view cone in degrees.
    pub angle_degrees: f64,
}

impl CullingConfig {
    pub fn new(angle_degrees: f64) -> Self {
        Self { angle_degrees }
    }

    pub(crate) fn half_angle_cos(&self) -> f64 {
        (self.angle_degrees.to_radians() / 2.0).cos()
    }
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self::new(90.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    /// Tile count window for the initial covering.
    pub target_tile_count: RangeInclusive<usize>,
    pub zoom_min: u8,
    pub zoom_max: u8,
    /// Detail multiplier; higher values refine further from the viewer.
    pub resolution: f64,
    /// `None` disables culling.
    pub culling: Option<CullingConfig>,
    /// Only refine children that still intersect the requested area.
    pub refine_inside_area_only: bool,
}

impl SegmentationConfig {
    /// Distance mapped to [`REFERENCE_ZOOM`].
    pub fn reference_distance(&self) -> f64 {
        REFERENCE_DISTANCE_M * self.resolution.max(f64::MIN_POSITIVE)
    }

    /// Deepest zoom segmentation refines to. An inverted range collapses to
    /// `zoom_min`.
    pub fn effective_zoom_max(&self) -> u8 {
        self.zoom_max.max(self.zoom_min)
    }

    /// Zoom a tile at `distance` metres from the viewer should be refined to.
    pub fn target_zoom(&self, distance: f64) -> u8 {
        let zoom_max = self.effective_zoom_max();
        if distance <= 0.0 || !distance.is_finite() {
            return zoom_max;
        }
        let steps = (distance / self.reference_distance()).log2().floor();
        let zoom = REFERENCE_ZOOM as f64 - steps;
        zoom.clamp(self.zoom_min as f64, zoom_max as f64) as u8
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            target_tile_count: 16..=64,
            zoom_min: 2,
            zoom_max: 19,
            resolution: 1.0,
            culling: None,
            refine_inside_area_only: true,
        }
    }
}
