//! Regular point grids sampled from a [`BoundedArea`](super::BoundedArea).

use std::ops::Index;

use crate::coord::GeoPoint;

/// A square grid of geographic points, row-major from the north-west corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PointGrid {
    resolution: usize,
    points: Vec<GeoPoint>,
}

impl PointGrid {
    pub(crate) fn from_points(resolution: usize, points: Vec<GeoPoint>) -> Self {
        debug_assert_eq!(points.len(), resolution * resolution);
        Self { resolution, points }
    }

    /// Number of points along one side.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&GeoPoint> {
        if row >= self.resolution || col >= self.resolution {
            return None;
        }
        self.points.get(row * self.resolution + col)
    }

    /// Overwrites the altitude of one point, e.g. with a sampled elevation.
    ///
    /// Returns `false` when the index is out of range.
    pub fn set_altitude(&mut self, row: usize, col: usize, altitude: f64) -> bool {
        if row >= self.resolution || col >= self.resolution {
            return false;
        }
        let idx = row * self.resolution + col;
        self.points[idx] = self.points[idx].with_altitude(altitude);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoPoint> {
        self.points.iter()
    }

    /// Iterates rows from north to south.
    pub fn rows(&self) -> impl Iterator<Item = &[GeoPoint]> {
        self.points.chunks(self.resolution.max(1))
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }
}

impl Index<(usize, usize)> for PointGrid {
    type Output = GeoPoint;

    fn index(&self, (row, col): (usize, usize)) -> &GeoPoint {
        &self.points[row * self.resolution + col]
    }
}

impl<'a> IntoIterator for &'a PointGrid {
    type Item = &'a GeoPoint;
    type IntoIter = std::slice::Iter<'a, GeoPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::area::BoundedArea;
    use crate::coord::GeoPoint;

    #[test]
    fn test_grid_spans_area_edges() {
        let area = BoundedArea::new(10.0, 20.0, 30.0, 40.0);
        let grid = area.point_grid(3);

        assert_eq!(grid.len(), 9);
        assert_eq!(grid[(0, 0)], GeoPoint::new(20.0, 30.0));
        assert_eq!(grid[(0, 2)], GeoPoint::new(20.0, 40.0));
        assert_eq!(grid[(1, 1)], GeoPoint::new(15.0, 35.0));
        assert_eq!(grid[(2, 2)], GeoPoint::new(10.0, 40.0));
    }

    #[test]
    fn test_resolution_one_is_midpoint() {
        let area = BoundedArea::new(10.0, 20.0, 30.0, 40.0);
        let grid = area.point_grid(1);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[(0, 0)], area.midpoint());
    }

    #[test]
    fn test_set_altitude() {
        let mut grid = BoundedArea::new(0.0, 1.0, 0.0, 1.0).point_grid(2);
        assert!(grid.set_altitude(1, 0, 512.0));
        assert_eq!(grid[(1, 0)].altitude, 512.0);
        assert_eq!(grid[(0, 0)].altitude, 0.0);
        assert!(!grid.set_altitude(2, 0, 1.0));
    }

    #[test]
    fn test_rows_are_north_to_south() {
        let grid = BoundedArea::new(0.0, 1.0, 0.0, 1.0).point_grid(4);
        let lats: Vec<f64> = grid.rows().map(|row| row[0].latitude).collect();
        assert!(lats.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(grid.get(4, 0), None);
    }
}
