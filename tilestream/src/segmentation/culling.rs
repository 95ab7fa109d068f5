//! View-cone culling and distance helpers for a single tile.

use glam::{DVec2, DVec3};

use crate::coord::LocalProjection;
use crate::tile::TileAddress;

use super::{CullingConfig, Viewpoint};

/// Below this horizontal length the forward ray counts as vertical.
const VERTICAL_EPSILON: f64 = 1e-9;

/// A tile's ground quad in the local frame, stored as `(east, north)`.
pub(super) struct TileQuad {
    min: DVec2,
    max: DVec2,
}

impl TileQuad {
    pub(super) fn new(tile: &TileAddress, projection: &LocalProjection) -> Self {
        let area = tile.area();
        let nw = projection.to_local(&area.north_west());
        let se = projection.to_local(&area.south_east());
        Self {
            min: DVec2::new(nw.east.min(se.east), nw.north.min(se.north)),
            max: DVec2::new(nw.east.max(se.east), nw.north.max(se.north)),
        }
    }

    /// Corners in order NW, NE, SE, SW.
    fn corners(&self) -> [DVec2; 4] {
        [
            DVec2::new(self.min.x, self.max.y),
            DVec2::new(self.max.x, self.max.y),
            DVec2::new(self.max.x, self.min.y),
            DVec2::new(self.min.x, self.min.y),
        ]
    }

    fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// 3D distance from the viewer to the closest ground point of the quad.
    pub(super) fn nearest_distance(&self, viewpoint: &Viewpoint) -> f64 {
        let eye = ground(viewpoint);
        let nearest = eye.clamp(self.min, self.max);
        let horizontal = eye.distance(nearest);
        horizontal.hypot(viewpoint.position.up)
    }

    /// False when no corner lies inside the view cone and the ground
    /// projection of the forward ray crosses neither diagonal.
    ///
    /// A quad under the viewer is always in view.
    pub(super) fn is_in_view(&self, viewpoint: &Viewpoint, culling: &CullingConfig) -> bool {
        let eye = ground(viewpoint);
        if self.contains(eye) {
            return true;
        }

        let forward = viewpoint.forward.normalize_or_zero();
        if forward == DVec3::ZERO {
            return true;
        }

        let eye3 = viewpoint.position.to_dvec3();
        let cos_half = culling.half_angle_cos();
        let corners = self.corners();
        let corner_visible = corners.iter().any(|c| {
            let to_corner = (DVec3::new(c.x, 0.0, c.y) - eye3).normalize_or_zero();
            to_corner == DVec3::ZERO || to_corner.dot(forward) >= cos_half
        });
        if corner_visible {
            return true;
        }

        let direction = DVec2::new(forward.x, forward.z);
        if direction.length() < VERTICAL_EPSILON {
            // the ray degenerates to the point under the viewer
            return false;
        }

        ray_crosses_segment(eye, direction, corners[0], corners[2])
            || ray_crosses_segment(eye, direction, corners[1], corners[3])
    }
}

fn ground(viewpoint: &Viewpoint) -> DVec2 {
    DVec2::new(viewpoint.position.east, viewpoint.position.north)
}

fn ray_crosses_segment(origin: DVec2, direction: DVec2, a: DVec2, b: DVec2) -> bool {
    let edge = b - a;
    let denom = direction.perp_dot(edge);
    if denom.abs() < f64::EPSILON {
        return false;
    }
    let offset = a - origin;
    let t = offset.perp_dot(edge) / denom;
    let s = offset.perp_dot(direction) / denom;
    t >= 0.0 && (0.0..=1.0).contains(&s)
}
