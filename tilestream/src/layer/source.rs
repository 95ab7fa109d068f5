//! Data sources behind a layer.

use std::future::Future;
use std::pin::Pin;

use crate::area::BoundedArea;
use crate::render::{Channel, HeightMesh, RenderError, RenderedTile, Texture};
use crate::tile::TileAddress;

use super::SourceError;

/// Boxed future type used at trait-object seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Data a layer can apply to a rendered tile.
pub trait Renderable: Clone + Send + Sync + 'static {
    /// The tile channel this data fills.
    const CHANNEL: Channel;

    /// Writes the data at `priority`. `Ok(false)` means the write was
    /// dropped in favour of higher priority data.
    fn apply(&self, tile: &RenderedTile, priority: i32) -> Result<bool, RenderError>;
}

impl Renderable for Texture {
    const CHANNEL: Channel = Channel::Texture;

    fn apply(&self, tile: &RenderedTile, priority: i32) -> Result<bool, RenderError> {
        tile.set_texture(self, priority)
    }
}

impl Renderable for HeightMesh {
    const CHANNEL: Channel = Channel::Mesh;

    fn apply(&self, tile: &RenderedTile, priority: i32) -> Result<bool, RenderError> {
        tile.set_mesh(self, priority)
    }
}

/// Produces layer data for one tile.
///
/// Sources do no caching, throttling or cancellation; the owning
/// [`DataLayer`](super::DataLayer) handles those.
pub trait LayerSource: Send + Sync + 'static {
    type Data: Renderable;

    fn fetch<'a>(
        &'a self,
        tile: TileAddress,
        area: &'a BoundedArea,
    ) -> BoxFuture<'a, Result<Self::Data, SourceError>>;
}
