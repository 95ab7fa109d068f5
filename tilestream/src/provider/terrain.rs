//! Elevation layer source decoding terrain-RGB tiles.
//!
//! Each pixel encodes a height as
//! `-10000 + (R * 65536 + G * 256 + B) * 0.1` metres.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use tracing::trace;

use crate::area::{BoundedArea, PointGrid};
use crate::coord::{self, EARTH_RADIUS_M};
use crate::layer::{BoxFuture, LayerSource, SettingsError, SourceError};
use crate::render::HeightMesh;
use crate::tile::TileAddress;

use super::{AsyncHttpClient, UrlTemplate};

/// Smallest accepted mesh resolution.
pub const MIN_MESH_RESOLUTION: usize = 2;

/// Largest accepted mesh resolution.
pub const MAX_MESH_RESOLUTION: usize = 257;

/// How mesh vertices sample the elevation raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}

/// Decodes one terrain-RGB pixel to metres.
#[inline]
pub fn decode_height(rgb: [u8; 3]) -> f64 {
    let [r, g, b] = rgb.map(f64::from);
    -10_000.0 + (r * 65_536.0 + g * 256.0 + b) * 0.1
}

pub struct TerrainRgbMeshSource<C> {
    template: UrlTemplate,
    client: C,
    resolution: usize,
    interpolation: Interpolation,
}

impl<C: AsyncHttpClient> TerrainRgbMeshSource<C> {
    pub fn new(
        name: &str,
        template: UrlTemplate,
        client: C,
        resolution: usize,
        interpolation: Interpolation,
    ) -> Result<Self, SettingsError> {
        if !(MIN_MESH_RESOLUTION..=MAX_MESH_RESOLUTION).contains(&resolution) {
            return Err(SettingsError::InvalidMeshResolution {
                name: name.to_string(),
                resolution,
            });
        }
        Ok(Self {
            template,
            client,
            resolution,
            interpolation,
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }
}

/// Ground width of one mesh cell of `tile`, at the tile's centre latitude.
pub(crate) fn cell_size(tile: TileAddress, resolution: usize) -> f64 {
    let latitude = coord::tile_to_center_point(tile).latitude.to_radians();
    let tile_width = 2.0 * PI * EARTH_RADIUS_M * latitude.cos() / (1u64 << tile.zoom) as f64;
    tile_width / (resolution.max(2) - 1) as f64
}

/// Writes the elevation under every point of `grid` into its altitude.
///
/// `image` is the terrain-RGB raster of `tile`; each point is located in the
/// raster through its Mercator position inside the tile, with the raster
/// edges on the tile edges.
pub fn sample_elevation(
    image: &RgbaImage,
    tile: TileAddress,
    interpolation: Interpolation,
    grid: &mut PointGrid,
) {
    let (width, height) = image.dimensions();
    let resolution = grid.resolution();
    if width == 0 || height == 0 {
        for row in 0..resolution {
            for col in 0..resolution {
                grid.set_altitude(row, col, 0.0);
            }
        }
        return;
    }
    let max_x = width.saturating_sub(1) as f64;
    let max_y = height.saturating_sub(1) as f64;
    let at = |x: u32, y: u32| {
        let p = image.get_pixel(x.min(width - 1), y.min(height - 1)).0;
        decode_height([p[0], p[1], p[2]])
    };

    for row in 0..resolution {
        for col in 0..resolution {
            let (fx, fy) = coord::point_to_fractional_tile(&grid[(row, col)], tile.zoom);
            let u = (fx - tile.x as f64).clamp(0.0, 1.0) * max_x;
            let v = (fy - tile.y as f64).clamp(0.0, 1.0) * max_y;
            let h = match interpolation {
                Interpolation::Nearest => at(u.round() as u32, v.round() as u32),
                Interpolation::Bilinear => {
                    let (x0, y0) = (u.floor() as u32, v.floor() as u32);
                    let (tx, ty) = (u - x0 as f64, v - y0 as f64);
                    let top = at(x0, y0) * (1.0 - tx) + at(x0 + 1, y0) * tx;
                    let bottom = at(x0, y0 + 1) * (1.0 - tx) + at(x0 + 1, y0 + 1) * tx;
                    top * (1.0 - ty) + bottom * ty
                }
            };
            grid.set_altitude(row, col, h);
        }
    }
}

impl<C: AsyncHttpClient> LayerSource for TerrainRgbMeshSource<C> {
    type Data = HeightMesh;

    fn fetch<'a>(
        &'a self,
        tile: TileAddress,
        _area: &'a BoundedArea,
    ) -> BoxFuture<'a, Result<HeightMesh, SourceError>> {
        Box::pin(async move {
            let url = self.template.expand(tile);
            let bytes = self.client.get(&url).await?;
            let image = image::load_from_memory(&bytes)
                .map_err(|e| SourceError::Decode(format!("Invalid elevation tile: {}", e)))?
                .to_rgba8();
            if image.width() == 0 || image.height() == 0 {
                return Err(SourceError::InvalidResponse("Empty elevation tile".into()));
            }

            let mut grid = tile.area().point_grid(self.resolution);
            sample_elevation(&image, tile, self.interpolation, &mut grid);
            trace!(%tile, resolution = self.resolution, "Decoded elevation");
            let heights = grid.iter().map(|point| point.altitude).collect();
            HeightMesh::from_heights(self.resolution, heights, cell_size(tile, self.resolution))
                .ok_or_else(|| SourceError::Decode("Height sample count mismatch".into()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::http::mock::MockHttpClient;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    /// Encodes `metres` as a terrain-RGB pixel.
    fn encode(metres: f64) -> Rgba<u8> {
        let v = ((metres + 10_000.0) / 0.1).round() as u32;
        Rgba([(v >> 16) as u8, (v >> 8) as u8, v as u8, 255])
    }

    #[test]
    fn test_decode_height() {
        assert_eq!(decode_height([0, 0, 0]), -10_000.0);
        assert!((decode_height([1, 134, 160]) - 0.0).abs() < 1e-9);
        let p = encode(1234.5).0;
        assert!((decode_height([p[0], p[1], p[2]]) - 1234.5).abs() < 1e-6);
    }

    #[test]
    fn test_interpolation_parse() {
        assert_eq!("Nearest".parse(), Ok(Interpolation::Nearest));
        assert_eq!(" bilinear ".parse(), Ok(Interpolation::Bilinear));
        assert!("cubic".parse::<Interpolation>().is_err());
    }

    #[test]
    fn test_bilinear_midpoint() {
        // 2x1 raster: 0 m on the west edge, 100 m on the east edge
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, encode(0.0));
        image.put_pixel(1, 0, encode(100.0));
        let tile = TileAddress::new(0, 0, 1);

        let mut grid = tile.area().point_grid(3);
        sample_elevation(&image, tile, Interpolation::Bilinear, &mut grid);
        let row: Vec<f64> = (0..3).map(|col| grid[(0, col)].altitude.round()).collect();
        assert_eq!(row, vec![0.0, 50.0, 100.0]);

        let mut nearest = tile.area().point_grid(3);
        sample_elevation(&image, tile, Interpolation::Nearest, &mut nearest);
        // 0.5 rounds away from zero
        assert_eq!(nearest[(0, 1)].altitude.round(), 100.0);
    }

    #[test]
    fn test_rows_follow_mercator_position() {
        // 1x3 raster: north, middle and south rows
        let mut image = RgbaImage::new(1, 3);
        image.put_pixel(0, 0, encode(300.0));
        image.put_pixel(0, 1, encode(200.0));
        image.put_pixel(0, 2, encode(100.0));
        let tile = TileAddress::new(3, 2, 3);

        let mut grid = tile.area().point_grid(2);
        sample_elevation(&image, tile, Interpolation::Nearest, &mut grid);
        assert_eq!(grid[(0, 0)].altitude.round(), 300.0);
        assert_eq!(grid[(1, 1)].altitude.round(), 100.0);
        // positions are kept, only altitudes change
        assert_eq!(grid[(0, 0)].latitude, tile.area().max_lat());
    }

    #[test]
    fn test_resolution_bounds() {
        let template = UrlTemplate::parse("dem", "http://t/{z}/{x}/{y}", vec![]).unwrap();
        let result = TerrainRgbMeshSource::new(
            "dem",
            template,
            MockHttpClient::ok(Vec::new()),
            1,
            Interpolation::Nearest,
        );
        assert!(matches!(
            result,
            Err(SettingsError::InvalidMeshResolution { resolution: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_builds_mesh() {
        let image = RgbaImage::from_pixel(8, 8, encode(250.0));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();

        let template = UrlTemplate::parse("dem", "http://t/{z}/{x}/{y}", vec![]).unwrap();
        let source = TerrainRgbMeshSource::new(
            "dem",
            template,
            MockHttpClient::ok(bytes.into_inner()),
            5,
            Interpolation::Bilinear,
        )
        .unwrap();

        let tile = TileAddress::new(1, 1, 2);
        let mesh = source.fetch(tile, &tile.area()).await.unwrap();
        assert_eq!(mesh.resolution(), 5);
        assert!(mesh.heights().iter().all(|h| (h - 250.0).abs() < 1e-6));
    }

    #[test]
    fn test_cell_size_shrinks_with_zoom() {
        let coarse = cell_size(TileAddress::new(0, 0, 1), 33);
        let fine = cell_size(TileAddress::new(0, 0, 2), 33);
        assert!(fine < coarse);
    }
}
