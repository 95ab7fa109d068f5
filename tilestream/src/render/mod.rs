//! Tile rendering state.
//!
//! The host owns the scene graph; this module owns everything the streamer
//! needs to drive it:
//!
//! - [`RenderHost`] / [`RenderTarget`]: the host-side contract
//! - [`Texture`] / [`HeightMesh`]: data applied to targets
//! - [`RenderedTile`]: priority-gated per-tile state with crossfade and
//!   draw-order bias
//! - [`TileMap`]: the concurrent tile map, also used as the neighbor index
//! - [`stitch`]: edge stitching between zoom-mismatched neighbors

mod data;
mod map;
pub mod recording;
pub mod stitch;
mod target;
mod tile;

pub use data::{Channel, EdgeSample, HeightMesh, Texture};
pub use map::{TileMap, MAX_NEIGHBOR_DESCENT};
pub use target::{RenderError, RenderHost, RenderTarget};
pub use tile::{RenderedTile, DELAYED_FIXUP_FACTOR, DRAW_ORDER_BIAS, DRAW_ORDER_SNAP};
