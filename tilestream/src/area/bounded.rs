//! Axis-aligned geographic rectangles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;

use crate::coord::{self, GeoPoint, PlanarPosition, EARTH_RADIUS_M, MAX_LON, MIN_LON};
use crate::tile::TileAddress;

use super::PointGrid;

/// Nudge (in tile units) that keeps an edge lying exactly on a tile boundary
/// from pulling in the neighboring row or column.
const EDGE_EPSILON: f64 = 1e-6;

/// A latitude/longitude rectangle.
///
/// Bounds are normalized at construction so that `min <= max` on both axes.
/// Equality and hashing use the bit pattern of the four bounds, which makes
/// the area usable as a cache key.
#[derive(Debug, Clone, Copy)]
pub struct BoundedArea {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl BoundedArea {
    /// Creates an area from two latitudes and two longitudes in any order.
    pub fn new(lat_a: f64, lat_b: f64, lon_a: f64, lon_b: f64) -> Self {
        let a = GeoPoint::new(lat_a, lon_a);
        let b = GeoPoint::new(lat_b, lon_b);
        Self {
            min_lat: a.latitude.min(b.latitude),
            max_lat: a.latitude.max(b.latitude),
            min_lon: a.longitude.min(b.longitude),
            max_lon: a.longitude.max(b.longitude),
        }
    }

    /// A square of `2 * half_size_m` metres (in projected space) centred on
    /// `center`.
    ///
    /// The square is cut at the antimeridian rather than wrapped, so it never
    /// turns into a band around the globe.
    pub fn around(center: &GeoPoint, half_size_m: f64) -> Self {
        let c = coord::project(&center.with_altitude(0.0));
        let half = half_size_m.abs();
        let sw = coord::unproject(&PlanarPosition::new(c.east - half, 0.0, c.north - half));
        let ne = coord::unproject(&PlanarPosition::new(c.east + half, 0.0, c.north + half));
        let lon = |east: f64| (east / EARTH_RADIUS_M).to_degrees().clamp(MIN_LON, MAX_LON);
        Self {
            min_lat: sw.latitude,
            max_lat: ne.latitude,
            min_lon: lon(c.east - half),
            max_lon: lon(c.east + half),
        }
    }

    /// Geographic extent of a tile.
    pub fn from_tile(tile: TileAddress) -> Self {
        let nw = coord::tile_to_north_west_point(tile);
        // the south-east corner is the north-west corner of the diagonal
        // neighbor, which may sit one past the grid edge
        let se = coord::tile_to_north_west_point(TileAddress::new(
            tile.x + 1,
            tile.y + 1,
            tile.zoom,
        ));
        Self::new(nw.latitude, se.latitude, nw.longitude, se.longitude)
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn width_degrees(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height_degrees(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// True when the area has no extent along at least one axis.
    pub fn is_degenerate(&self) -> bool {
        self.width_degrees() <= 0.0 || self.height_degrees() <= 0.0
    }

    pub fn midpoint(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn north_west(&self) -> GeoPoint {
        GeoPoint::new(self.max_lat, self.min_lon)
    }

    pub fn north_east(&self) -> GeoPoint {
        GeoPoint::new(self.max_lat, self.max_lon)
    }

    pub fn south_west(&self) -> GeoPoint {
        GeoPoint::new(self.min_lat, self.min_lon)
    }

    pub fn south_east(&self) -> GeoPoint {
        GeoPoint::new(self.min_lat, self.max_lon)
    }

    /// Inclusive point containment.
    pub fn contains_point(&self, point: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lon..=self.max_lon).contains(&point.longitude)
    }

    /// True when `other` lies entirely within this area.
    pub fn contains_area(&self, other: &BoundedArea) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
    }

    /// Inclusive overlap test; areas sharing only an edge intersect.
    pub fn intersects(&self, other: &BoundedArea) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
    }

    /// Samples a `resolution x resolution` grid spanning the area edges.
    ///
    /// Points are stored row-major starting at the north-west corner. A
    /// resolution of 1 yields the midpoint.
    pub fn point_grid(&self, resolution: usize) -> PointGrid {
        let resolution = resolution.max(1);
        if resolution == 1 {
            return PointGrid::from_points(1, vec![self.midpoint()]);
        }

        let steps = (resolution - 1) as f64;
        let lat_step = self.height_degrees() / steps;
        let lon_step = self.width_degrees() / steps;

        let mut points = Vec::with_capacity(resolution * resolution);
        for row in 0..resolution {
            let lat = self.max_lat - lat_step * row as f64;
            for col in 0..resolution {
                let lon = self.min_lon + lon_step * col as f64;
                points.push(GeoPoint::new(lat, lon));
            }
        }
        PointGrid::from_points(resolution, points)
    }

    /// Tile columns and rows covering this area at `zoom`.
    pub fn tile_range(&self, zoom: u8) -> TileRange {
        let (x0, y0) = coord::point_to_tile_coordinate(&self.north_west(), zoom);
        let (fx1, fy1) = coord::point_to_fractional_tile(&self.south_east(), zoom);
        let max_index = (TileAddress::grid_size(zoom) - 1) as f64;

        let x1 = ((fx1 - EDGE_EPSILON).ceil() - 1.0).clamp(0.0, max_index) as u32;
        let y1 = ((fy1 - EDGE_EPSILON).ceil() - 1.0).clamp(0.0, max_index) as u32;

        TileRange {
            zoom,
            columns: x0..=x1.max(x0),
            rows: y0..=y1.max(y0),
        }
    }

    fn key(&self) -> [u64; 4] {
        // + 0.0 folds -0.0 into 0.0 so equal values hash equally
        [
            (self.min_lat + 0.0).to_bits(),
            (self.max_lat + 0.0).to_bits(),
            (self.min_lon + 0.0).to_bits(),
            (self.max_lon + 0.0).to_bits(),
        ]
    }
}

impl PartialEq for BoundedArea {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for BoundedArea {}

impl Hash for BoundedArea {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for BoundedArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}..{:.6}, {:.6}..{:.6}]",
            self.min_lat, self.max_lat, self.min_lon, self.max_lon
        )
    }
}

/// Rectangular block of tiles at a single zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub columns: RangeInclusive<u32>,
    pub rows: RangeInclusive<u32>,
}

impl TileRange {
    pub fn tile_count_x(&self) -> u64 {
        (*self.columns.end() - *self.columns.start()) as u64 + 1
    }

    pub fn tile_count_y(&self) -> u64 {
        (*self.rows.end() - *self.rows.start()) as u64 + 1
    }

    pub fn tile_count(&self) -> u64 {
        self.tile_count_x() * self.tile_count_y()
    }

    /// Row-major iteration over every tile of the range.
    pub fn tiles(&self) -> impl Iterator<Item = TileAddress> + '_ {
        self.rows.clone().flat_map(move |y| {
            self.columns
                .clone()
                .map(move |x| TileAddress::new(x, y, self.zoom))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bounds_are_normalized() {
        let area = BoundedArea::new(10.0, -10.0, 20.0, 5.0);
        assert_eq!(area.min_lat(), -10.0);
        assert_eq!(area.max_lat(), 10.0);
        assert_eq!(area.min_lon(), 5.0);
        assert_eq!(area.max_lon(), 20.0);
    }

    #[test]
    fn test_corners_and_midpoint() {
        let area = BoundedArea::new(40.0, 42.0, -75.0, -73.0);
        assert_eq!(area.north_west(), GeoPoint::new(42.0, -75.0));
        assert_eq!(area.south_east(), GeoPoint::new(40.0, -73.0));
        assert_eq!(area.midpoint(), GeoPoint::new(41.0, -74.0));
    }

    #[test]
    fn test_equal_areas_hash_equally() {
        let mut set = HashSet::new();
        set.insert(BoundedArea::new(0.0, 1.0, 0.0, 1.0));
        set.insert(BoundedArea::new(1.0, 0.0, 1.0, 0.0));
        set.insert(BoundedArea::new(-0.0, 1.0, 0.0, 1.0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_containment() {
        let outer = BoundedArea::new(0.0, 10.0, 0.0, 10.0);
        let inner = BoundedArea::new(2.0, 3.0, 2.0, 3.0);
        assert!(outer.contains_area(&inner));
        assert!(!inner.contains_area(&outer));
        assert!(outer.contains_point(&GeoPoint::new(10.0, 0.0)));
        assert!(!outer.contains_point(&GeoPoint::new(10.1, 0.0)));
    }

    #[test]
    fn test_intersection() {
        let a = BoundedArea::new(0.0, 10.0, 0.0, 10.0);
        let b = BoundedArea::new(5.0, 15.0, 5.0, 15.0);
        let edge = BoundedArea::new(10.0, 20.0, 0.0, 10.0);
        let far = BoundedArea::new(20.0, 30.0, 20.0, 30.0);
        assert!(a.intersects(&b));
        assert!(a.intersects(&edge));
        assert!(!a.intersects(&far));
    }

    #[test]
    fn test_degenerate() {
        let p = GeoPoint::new(12.0, 34.0);
        let area = BoundedArea::new(p.latitude, p.latitude, p.longitude, p.longitude);
        assert!(area.is_degenerate());
        assert!(!BoundedArea::new(0.0, 1.0, 0.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_around_is_roughly_square_in_metres() {
        let area = BoundedArea::around(&GeoPoint::new(0.0, 0.0), 1000.0);
        // ~0.009 degrees per kilometre at the equator
        assert!((area.width_degrees() - 0.01797).abs() < 1e-4);
        assert!((area.height_degrees() - 0.01797).abs() < 1e-4);
        assert!(area.contains_point(&GeoPoint::new(0.0, 0.0)));
    }

    #[test]
    fn test_around_stops_at_antimeridian() {
        let east = BoundedArea::around(&GeoPoint::new(0.0, 179.99), 4_000.0);
        assert!(east.width_degrees() < 1.0);
        assert_eq!(east.max_lon(), 180.0);
        assert!(east.contains_point(&GeoPoint::new(0.0, 179.99)));

        let west = BoundedArea::around(&GeoPoint::new(-17.0, -179.99), 4_000.0);
        assert!(west.width_degrees() < 1.0);
        assert_eq!(west.min_lon(), -180.0);
        assert!(west.contains_point(&GeoPoint::new(-17.0, -179.99)));
    }

    #[test]
    fn test_around_huge_square_covers_world_width() {
        let area = BoundedArea::around(&GeoPoint::new(0.0, 0.0), 1.0e8);
        assert_eq!(area.min_lon(), -180.0);
        assert_eq!(area.max_lon(), 180.0);
        assert!(area.min_lat() < area.max_lat());
    }

    #[test]
    fn test_from_tile_matches_tile_corners() {
        let tile = TileAddress::new(1, 1, 1);
        let area = BoundedArea::from_tile(tile);
        assert!((area.max_lat() - 0.0).abs() < 1e-9);
        assert!((area.min_lat() - crate::coord::MIN_LAT).abs() < 1e-6);
        assert_eq!(area.min_lon(), 0.0);
        assert_eq!(area.max_lon(), 180.0);
    }

    #[test]
    fn test_tile_range_of_tile_area_is_the_tile() {
        let tile = TileAddress::new(301, 387, 10);
        let range = tile.area().tile_range(10);
        assert_eq!(range.tile_count(), 1);
        assert_eq!(range.tiles().next(), Some(tile));
    }

    #[test]
    fn test_tile_range_at_finer_zoom() {
        let tile = TileAddress::new(5, 9, 4);
        let range = tile.area().tile_range(6);
        assert_eq!(range.tile_count_x(), 4);
        assert_eq!(range.tile_count_y(), 4);
        assert!(range.tiles().all(|t| tile.contains(&t)));
    }

    #[test]
    fn test_world_range() {
        let world = BoundedArea::new(-90.0, 90.0, -180.0, 180.0);
        assert_eq!(world.tile_range(0).tile_count(), 1);
        assert_eq!(world.tile_range(3).tile_count(), 64);
    }

    #[test]
    fn test_point_range_is_single_tile() {
        let area = BoundedArea::new(12.5, 12.5, 45.0, 45.0);
        assert_eq!(area.tile_range(8).tile_count(), 1);
    }
}
