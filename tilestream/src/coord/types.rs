//! Coordinate type definitions

use std::fmt;

use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Deepest zoom level any tile address may carry.
pub const MAX_ZOOM: u8 = 24;

/// Spherical Web Mercator earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// A geographic position.
///
/// Latitude is clamped to the Web Mercator range and longitude is wrapped
/// into `[-180, 180]` at construction, so every `GeoPoint` is projectable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north
    pub latitude: f64,
    /// Longitude in degrees, positive east
    pub longitude: f64,
    /// Altitude above the ellipsoid in metres
    pub altitude: f64,
}

impl GeoPoint {
    /// Creates a point at zero altitude.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::with_elevation(latitude, longitude, 0.0)
    }

    /// Creates a point with an explicit altitude.
    pub fn with_elevation(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude: latitude.clamp(MIN_LAT, MAX_LAT),
            longitude: wrap_longitude(longitude),
            altitude,
        }
    }

    /// Returns a copy of this point with the altitude overwritten.
    ///
    /// This is the only way a point changes after construction; elevation
    /// sampling uses it to attach terrain heights to grid points.
    pub fn with_altitude(self, altitude: f64) -> Self {
        Self { altitude, ..self }
    }

    /// Local linear distortion of the Mercator projection at this point.
    pub fn scale_factor(&self) -> f64 {
        1.0 / self.latitude.to_radians().cos()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.1}m)",
            self.latitude, self.longitude, self.altitude
        )
    }
}

/// A position in projected space, in metres.
///
/// `up` is the vertical axis; it carries altitude multiplied by the local
/// scale factor so vertical exaggeration matches the horizontal distortion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarPosition {
    /// Metres east of the projection origin
    pub east: f64,
    /// Metres above the projection origin (scaled)
    pub up: f64,
    /// Metres north of the projection origin
    pub north: f64,
}

impl PlanarPosition {
    pub fn new(east: f64, up: f64, north: f64) -> Self {
        Self { east, up, north }
    }

    /// Converts to a glam vector laid out as `(east, up, north)`.
    pub fn to_dvec3(self) -> glam::DVec3 {
        glam::DVec3::new(self.east, self.up, self.north)
    }

    pub fn from_dvec3(v: glam::DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    /// Straight-line distance to another position.
    pub fn distance(&self, other: &PlanarPosition) -> f64 {
        self.to_dvec3().distance(other.to_dvec3())
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    #[error("Invalid latitude: {0} (must be between {} and {})", MIN_LAT, MAX_LAT)]
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    #[error("Invalid longitude: {0} (must be between {} and {})", MIN_LON, MAX_LON)]
    InvalidLongitude(f64),
    /// Zoom level is outside valid range
    #[error("Invalid zoom level: {0} (must be at most {})", MAX_ZOOM)]
    InvalidZoom(u8),
    /// Quadkey contains invalid characters or is too long
    #[error("Invalid quadkey: '{0}' (must contain only digits 0-3 and length <= {})", MAX_ZOOM)]
    InvalidQuadkey(String),
}

fn wrap_longitude(lon: f64) -> f64 {
    if (MIN_LON..=MAX_LON).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps exactly 180 to -180; keep the eastern edge representable
    if wrapped == MIN_LON && lon > 0.0 {
        MAX_LON
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latitude_is_clamped() {
        let p = GeoPoint::new(89.9, 10.0);
        assert_eq!(p.latitude, MAX_LAT);

        let p = GeoPoint::new(-90.0, 10.0);
        assert_eq!(p.latitude, MIN_LAT);
    }

    #[test]
    fn test_longitude_is_wrapped() {
        assert!((GeoPoint::new(0.0, 190.0).longitude - (-170.0)).abs() < 1e-9);
        assert!((GeoPoint::new(0.0, -190.0).longitude - 170.0).abs() < 1e-9);
        assert_eq!(GeoPoint::new(0.0, 180.0).longitude, 180.0);
        assert_eq!(GeoPoint::new(0.0, 540.0).longitude, 180.0);
    }

    #[test]
    fn test_with_altitude_only_changes_altitude() {
        let p = GeoPoint::new(47.0, 8.0);
        let q = p.with_altitude(1200.0);
        assert_eq!(q.latitude, p.latitude);
        assert_eq!(q.longitude, p.longitude);
        assert_eq!(q.altitude, 1200.0);
    }

    #[test]
    fn test_scale_factor_at_equator_is_one() {
        assert!((GeoPoint::new(0.0, 0.0).scale_factor() - 1.0).abs() < 1e-12);
        assert!((GeoPoint::new(60.0, 0.0).scale_factor() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_coord_error_display() {
        let err = CoordError::InvalidQuadkey("0124".to_string());
        assert!(err.to_string().contains("0124"));
    }
}
