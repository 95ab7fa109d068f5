//! Host-side rendering contract.

use std::sync::Arc;

use thiserror::Error;

use crate::tile::TileAddress;

use super::{HeightMesh, Texture};

/// Failure applying data to a render target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The target was already destroyed
    #[error("Render target for {0} was destroyed")]
    Destroyed(TileAddress),
    /// The host rejected the data
    #[error("Render host rejected {channel} data: {reason}")]
    Rejected {
        channel: super::Channel,
        reason: String,
    },
}

/// Scene-graph node for one tile, owned by the rendering host.
///
/// Calls arrive from tokio worker threads, so implementations synchronize
/// internally.
pub trait RenderTarget: Send + Sync {
    fn set_texture(&self, texture: &Texture) -> Result<(), RenderError>;

    fn set_mesh(&self, mesh: &HeightMesh) -> Result<(), RenderError>;

    fn clear_texture(&self);

    fn clear_mesh(&self);

    /// Opacity in `[0, 1]`.
    fn set_opacity(&self, opacity: f32);

    /// Depth offset toward the camera; 0 is the neutral position.
    fn set_draw_offset(&self, offset: f64);

    /// Releases the node. No other call follows.
    fn destroy(&self);
}

/// Factory for render targets.
pub trait RenderHost: Send + Sync {
    fn create_target(&self, tile: TileAddress) -> Arc<dyn RenderTarget>;
}
