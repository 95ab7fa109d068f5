//! Always-available base layer sources.
//!
//! These never fail, so a collection always has something to fall back to.

use crate::area::BoundedArea;
use crate::layer::{BoxFuture, LayerSource, SourceError};
use crate::render::{HeightMesh, Texture};
use crate::tile::TileAddress;

/// Fills every tile with one colour.
#[derive(Debug, Clone)]
pub struct SolidColorTextureSource {
    texture: Texture,
}

impl SolidColorTextureSource {
    pub fn new(rgba: [u8; 4]) -> Self {
        Self {
            texture: Texture::solid(1, 1, rgba),
        }
    }
}

impl Default for SolidColorTextureSource {
    fn default() -> Self {
        Self::new([128, 128, 128, 255])
    }
}

impl LayerSource for SolidColorTextureSource {
    type Data = Texture;

    fn fetch<'a>(
        &'a self,
        _tile: TileAddress,
        _area: &'a BoundedArea,
    ) -> BoxFuture<'a, Result<Texture, SourceError>> {
        Box::pin(async move { Ok(self.texture.clone()) })
    }
}

/// Sea-level mesh for every tile.
#[derive(Debug, Clone)]
pub struct FlatMeshSource {
    mesh: HeightMesh,
}

impl FlatMeshSource {
    pub fn new(resolution: usize) -> Self {
        Self {
            mesh: HeightMesh::flat(resolution, 0.0),
        }
    }
}

impl Default for FlatMeshSource {
    fn default() -> Self {
        Self::new(2)
    }
}

impl LayerSource for FlatMeshSource {
    type Data = HeightMesh;

    fn fetch<'a>(
        &'a self,
        _tile: TileAddress,
        _area: &'a BoundedArea,
    ) -> BoxFuture<'a, Result<HeightMesh, SourceError>> {
        Box::pin(async move { Ok(self.mesh.clone()) })
    }
}
