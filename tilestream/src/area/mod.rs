//! Geographic rectangles and point grids.
//!
//! [`BoundedArea`] is the request key of every data layer cache and the input
//! of segmentation. [`PointGrid`] samples an area at a fixed resolution, which
//! is how height meshes are laid out.

mod bounded;
mod grid;

pub use bounded::{BoundedArea, TileRange};
pub use grid::PointGrid;
