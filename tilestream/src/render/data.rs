//! Renderable tile payloads.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;

use crate::tile::Direction;

/// Which half of a tile a piece of data feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Texture,
    Mesh,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Texture => f.write_str("texture"),
            Channel::Mesh => f.write_str("mesh"),
        }
    }
}

/// An RGBA8 image.
///
/// Pixel storage is shared so cache hits and clones stay cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
}

impl Texture {
    /// Wraps raw RGBA8 pixels. Returns `None` when the buffer size does not
    /// match the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// A single-colour texture.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let pixels = rgba.iter().copied().cycle().take(count * 4).collect();
        Self {
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }
}

impl From<image::RgbaImage> for Texture {
    fn from(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: Arc::new(img.into_raw()),
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// A square height field with per-vertex normals.
///
/// Vertices are row-major from the tile's north-west corner; heights are in
/// metres. Normals use the `(east, up, north)` axis layout.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMesh {
    resolution: usize,
    heights: Vec<f64>,
    normals: Vec<DVec3>,
}

/// One vertex sample along a mesh edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSample {
    pub height: f64,
    pub normal: DVec3,
}

impl HeightMesh {
    /// A level mesh at `height` metres.
    pub fn flat(resolution: usize, height: f64) -> Self {
        let resolution = resolution.max(2);
        let count = resolution * resolution;
        Self {
            resolution,
            heights: vec![height; count],
            normals: vec![DVec3::Y; count],
        }
    }

    /// Builds a mesh from sampled heights, deriving normals with central
    /// differences over `cell_size_m` spacing.
    ///
    /// Returns `None` when the sample count does not match the resolution.
    pub fn from_heights(resolution: usize, heights: Vec<f64>, cell_size_m: f64) -> Option<Self> {
        if resolution < 2 || heights.len() != resolution * resolution {
            return None;
        }
        let mut mesh = Self {
            resolution,
            normals: vec![DVec3::Y; heights.len()],
            heights,
        };
        mesh.recompute_normals(cell_size_m);
        Some(mesh)
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    pub fn normals(&self) -> &[DVec3] {
        &self.normals
    }

    pub fn height(&self, row: usize, col: usize) -> f64 {
        self.heights[row * self.resolution + col]
    }

    pub fn normal(&self, row: usize, col: usize) -> DVec3 {
        self.normals[row * self.resolution + col]
    }

    /// Vertex indices along one edge.
    ///
    /// North and south edges run west to east, east and west edges run
    /// north to south.
    fn edge_indices(&self, direction: Direction) -> impl Iterator<Item = usize> {
        let n = self.resolution;
        (0..n).map(move |i| match direction {
            Direction::North => i,
            Direction::South => (n - 1) * n + i,
            Direction::West => i * n,
            Direction::East => i * n + n - 1,
        })
    }

    pub fn edge(&self, direction: Direction) -> Vec<EdgeSample> {
        self.edge_indices(direction)
            .map(|i| EdgeSample {
                height: self.heights[i],
                normal: self.normals[i],
            })
            .collect()
    }

    /// Overwrites one edge. Extra or missing samples are ignored.
    pub fn set_edge(&mut self, direction: Direction, samples: &[EdgeSample]) {
        let indices: Vec<usize> = self.edge_indices(direction).collect();
        for (i, sample) in indices.into_iter().zip(samples) {
            self.heights[i] = sample.height;
            self.normals[i] = sample.normal;
        }
    }

    fn recompute_normals(&mut self, cell_size_m: f64) {
        let n = self.resolution;
        let cell = if cell_size_m > 0.0 { cell_size_m } else { 1.0 };

        for row in 0..n {
            for col in 0..n {
                let west = self.height(row, col.saturating_sub(1));
                let east = self.height(row, (col + 1).min(n - 1));
                let north = self.height(row.saturating_sub(1), col);
                let south = self.height((row + 1).min(n - 1), col);

                let dx = (col + 1).min(n - 1) - col.saturating_sub(1);
                let dy = (row + 1).min(n - 1) - row.saturating_sub(1);

                // rows grow southward, so north minus south is the +north slope
                let slope_east = (east - west) / (dx as f64 * cell);
                let slope_north = (north - south) / (dy as f64 * cell);
                self.normals[row * n + col] =
                    DVec3::new(-slope_east, 1.0, -slope_north).normalize();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_texture() {
        let tex = Texture::solid(4, 2, [10, 20, 30, 255]);
        assert_eq!(tex.pixels().len(), 32);
        assert_eq!(tex.pixel(3, 1), Some([10, 20, 30, 255]));
        assert_eq!(tex.pixel(4, 0), None);
    }

    #[test]
    fn test_from_rgba_checks_size() {
        assert!(Texture::from_rgba(2, 2, vec![0; 16]).is_some());
        assert!(Texture::from_rgba(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn test_flat_mesh_normals_point_up() {
        let mesh = HeightMesh::flat(5, 100.0);
        assert_eq!(mesh.heights().len(), 25);
        assert!(mesh.normals().iter().all(|n| *n == DVec3::Y));
    }

    #[test]
    fn test_slope_normals_lean_downhill() {
        // height rises to the east
        let heights = (0..9).map(|i| (i % 3) as f64 * 10.0).collect();
        let mesh = HeightMesh::from_heights(3, heights, 10.0).unwrap();
        let n = mesh.normal(1, 1);
        assert!(n.x < 0.0);
        assert!(n.z.abs() < 1e-12);
        assert!((n.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_edges() {
        let heights = (0..9).map(|i| i as f64).collect();
        let mut mesh = HeightMesh::from_heights(3, heights, 1.0).unwrap();

        let heights_of = |m: &HeightMesh, d| -> Vec<f64> {
            m.edge(d).iter().map(|s| s.height).collect()
        };
        assert_eq!(heights_of(&mesh, Direction::North), vec![0.0, 1.0, 2.0]);
        assert_eq!(heights_of(&mesh, Direction::South), vec![6.0, 7.0, 8.0]);
        assert_eq!(heights_of(&mesh, Direction::West), vec![0.0, 3.0, 6.0]);
        assert_eq!(heights_of(&mesh, Direction::East), vec![2.0, 5.0, 8.0]);

        let samples = vec![
            EdgeSample {
                height: -1.0,
                normal: DVec3::Y
            };
            3
        ];
        mesh.set_edge(Direction::East, &samples);
        assert_eq!(heights_of(&mesh, Direction::East), vec![-1.0, -1.0, -1.0]);
        assert_eq!(mesh.height(1, 1), 4.0);
    }
}
