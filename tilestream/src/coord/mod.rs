//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude/
//! altitude), projected planar space, and Web Mercator tile coordinates.
//!
//! Projected space is spherical Web Mercator in metres. The vertical axis
//! carries altitude scaled by the local distortion factor so that terrain
//! keeps its proportions after projection. [`LocalProjection`] moves the
//! planar frame to an origin near the viewer, which is the frame the
//! segmentation and orchestration code work in.

mod types;

pub use types::{
    CoordError, GeoPoint, PlanarPosition, EARTH_RADIUS_M, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT,
    MIN_LON,
};

use std::f64::consts::PI;

use crate::tile::TileAddress;

/// Nudge (in tile units) applied before flooring so that tile corner points
/// land in their own tile despite floating point error.
const TILE_EPSILON: f64 = 1e-6;

/// Projects a geographic point into planar Web Mercator space.
#[inline]
pub fn project(point: &GeoPoint) -> PlanarPosition {
    let lat_rad = point.latitude.to_radians();
    let east = EARTH_RADIUS_M * point.longitude.to_radians();
    let north = EARTH_RADIUS_M * (PI / 4.0 + lat_rad / 2.0).tan().ln();
    let up = point.altitude * point.scale_factor();

    PlanarPosition { east, up, north }
}

/// Inverse of [`project`].
#[inline]
pub fn unproject(position: &PlanarPosition) -> GeoPoint {
    let lon = (position.east / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (position.north / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();

    let ground = GeoPoint::new(lat, lon);
    ground.with_altitude(position.up / ground.scale_factor())
}

/// Local linear distortion factor of the projection at `point`.
///
/// Returns 1.0 when no point is given.
#[inline]
pub fn scale_factor(point: Option<&GeoPoint>) -> f64 {
    point.map_or(1.0, GeoPoint::scale_factor)
}

/// Converts a geographic point to the (x, y) tile grid coordinate at `zoom`.
///
/// Coordinates are clamped into `[0, 2^zoom)`.
#[inline]
pub fn point_to_tile_coordinate(point: &GeoPoint, zoom: u8) -> (u32, u32) {
    let (fx, fy) = point_to_fractional_tile(point, zoom);
    let max_index = (1u64 << zoom) - 1;

    let x = ((fx + TILE_EPSILON).floor().max(0.0) as u64).min(max_index) as u32;
    let y = ((fy + TILE_EPSILON).floor().max(0.0) as u64).min(max_index) as u32;
    (x, y)
}

/// Fractional tile grid position of a point at `zoom`.
#[inline]
pub fn point_to_fractional_tile(point: &GeoPoint, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let lat_rad = point.latitude.to_radians();

    let fx = (point.longitude + 180.0) / 360.0 * n;
    let fy = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;
    (fx, fy)
}

/// Validated variant of [`point_to_tile_coordinate`] for raw degrees.
pub fn to_tile_address(lat: f64, lon: f64, zoom: u8) -> Result<TileAddress, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let (x, y) = point_to_tile_coordinate(&GeoPoint::new(lat, lon), zoom);
    Ok(TileAddress::new(x, y, zoom))
}

/// Returns the north-west corner of a tile.
#[inline]
pub fn tile_to_north_west_point(tile: TileAddress) -> GeoPoint {
    fractional_tile_to_point(tile.x as f64, tile.y as f64, tile.zoom)
}

/// Returns the geographic center of a tile.
#[inline]
pub fn tile_to_center_point(tile: TileAddress) -> GeoPoint {
    fractional_tile_to_point(tile.x as f64 + 0.5, tile.y as f64 + 0.5, tile.zoom)
}

fn fractional_tile_to_point(fx: f64, fy: f64, zoom: u8) -> GeoPoint {
    let n = 2.0_f64.powi(zoom as i32);

    let lon = fx / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * fy / n)).sinh().atan();

    GeoPoint::new(lat_rad.to_degrees(), lon)
}

/// Planar projection re-centred on a fixed origin.
///
/// Horizontal axes are relative to the origin's projected position; the
/// vertical axis stays absolute so that ground level is `up == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin: GeoPoint,
    origin_planar: PlanarPosition,
}

impl LocalProjection {
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            origin_planar: project(&origin),
        }
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Geographic point → local frame.
    pub fn to_local(&self, point: &GeoPoint) -> PlanarPosition {
        let p = project(point);
        PlanarPosition {
            east: p.east - self.origin_planar.east,
            up: p.up,
            north: p.north - self.origin_planar.north,
        }
    }

    /// Local frame → geographic point.
    pub fn to_geo(&self, position: &PlanarPosition) -> GeoPoint {
        unproject(&PlanarPosition {
            east: position.east + self.origin_planar.east,
            up: position.up,
            north: position.north + self.origin_planar.north,
        })
    }
}

impl Default for LocalProjection {
    fn default() -> Self {
        Self::new(GeoPoint::new(0.0, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let result = to_tile_address(40.7128, -74.0060, 16);
        assert!(result.is_ok(), "Valid coordinates should not error");

        let tile = result.unwrap();
        assert_eq!(tile.y, 24640);
        assert_eq!(tile.x, 19295);
        assert_eq!(tile.zoom, 16);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_address(90.0, 0.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = to_tile_address(10.0, 10.0, MAX_ZOOM + 1);
        assert!(matches!(result, Err(CoordError::InvalidZoom(_))));
    }

    #[test]
    fn test_tile_to_north_west_point() {
        let tile = TileAddress::new(19295, 24640, 16);
        let nw = tile_to_north_west_point(tile);

        assert!((nw.latitude - 40.713).abs() < 0.01);
        assert!((nw.longitude - (-74.007)).abs() < 0.01);
    }

    #[test]
    fn test_tile_center_is_inside_tile() {
        let tile = TileAddress::new(512, 511, 10);
        let center = tile_to_center_point(tile);
        assert_eq!(point_to_tile_coordinate(&center, 10), (512, 511));
    }

    #[test]
    fn test_world_tile_corner() {
        let nw = tile_to_north_west_point(TileAddress::new(0, 0, 0));
        assert!((nw.latitude - MAX_LAT).abs() < 1e-6);
        assert_eq!(nw.longitude, -180.0);
        assert_eq!(point_to_tile_coordinate(&nw, 0), (0, 0));
    }

    #[test]
    fn test_project_origin() {
        let p = project(&GeoPoint::new(0.0, 0.0));
        assert!(p.east.abs() < 1e-9);
        assert!(p.north.abs() < 1e-9);
        assert_eq!(p.up, 0.0);
    }

    #[test]
    fn test_altitude_scaled_by_scale_factor() {
        let p = project(&GeoPoint::with_elevation(60.0, 0.0, 100.0));
        assert!((p.up - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_factor_without_point() {
        assert_eq!(scale_factor(None), 1.0);
        let p = GeoPoint::new(45.0, 0.0);
        assert!((scale_factor(Some(&p)) - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_local_projection_origin_maps_to_zero() {
        let origin = GeoPoint::new(46.5, 7.5);
        let projection = LocalProjection::new(origin);
        let local = projection.to_local(&origin);
        assert!(local.east.abs() < 1e-6);
        assert!(local.north.abs() < 1e-6);
    }

    #[test]
    fn test_local_projection_roundtrip() {
        let projection = LocalProjection::new(GeoPoint::new(46.5, 7.5));
        let p = GeoPoint::with_elevation(46.7, 7.9, 2500.0);
        let back = projection.to_geo(&projection.to_local(&p));
        assert!((back.latitude - p.latitude).abs() < 1e-9);
        assert!((back.longitude - p.longitude).abs() < 1e-9);
        assert!((back.altitude - p.altitude).abs() < 1e-6);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_projection_roundtrip(
                lat in -85.0..85.0_f64,
                lon in -179.99..179.99_f64,
                alt in -500.0..9000.0_f64
            ) {
                let p = GeoPoint::with_elevation(lat, lon, alt);
                let back = unproject(&project(&p));

                prop_assert!((back.latitude - p.latitude).abs() < 1e-9);
                prop_assert!((back.longitude - p.longitude).abs() < 1e-9);
                prop_assert!((back.altitude - p.altitude).abs() < 1e-6);
            }

            #[test]
            fn test_tile_roundtrip(
                x_raw in 0u32..u32::MAX,
                y_raw in 0u32..u32::MAX,
                zoom in 0u8..=20
            ) {
                let n = 1u32 << zoom;
                let tile = TileAddress::new(x_raw % n, y_raw % n, zoom);

                let nw = tile_to_north_west_point(tile);
                prop_assert_eq!(point_to_tile_coordinate(&nw, zoom), (tile.x, tile.y));
            }

            #[test]
            fn test_tile_coords_in_bounds(
                lat in -85.05..85.05_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=18
            ) {
                let tile = to_tile_address(lat, lon, zoom)?;
                let max_tile = 1u32 << zoom;
                prop_assert!(tile.x < max_tile);
                prop_assert!(tile.y < max_tile);
                prop_assert_eq!(tile.zoom, zoom);
            }

            #[test]
            fn test_longitude_monotonic(
                lat in 0.0..1.0_f64,
                lon1 in -180.0..-91.0_f64,
                lon2 in -89.0..0.0_f64,
                zoom in 10u8..=15
            ) {
                let tile1 = to_tile_address(lat, lon1, zoom)?;
                let tile2 = to_tile_address(lat, lon2, zoom)?;
                prop_assert!(tile1.x < tile2.x);
            }
        }
    }
}
