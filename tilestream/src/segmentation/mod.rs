//! Adaptive quadtree segmentation.
//!
//! Turns a requested [`BoundedArea`] and a [`Viewpoint`] into a set of tiles
//! whose zoom increases toward the viewer:
//!
//! ```text
//! initial covering (coarse, within tile budget)
//!         │
//!         ▼
//!   ┌──────────────┐   culled    ┌──────────┐
//!   │  work queue  │ ──────────► │ dropped  │
//!   └──────┬───────┘             └──────────┘
//!          │ zoom >= target zoom
//!          ▼
//!   ┌──────────────┐  otherwise: enqueue the four children
//!   │   emitted    │
//!   └──────────────┘
//! ```
//!
//! The result is a [`Segmentation`] backed by a `BTreeSet`, so identical
//! inputs always produce identical, identically ordered output.

mod config;
mod culling;

pub use config::{
    CullingConfig, SegmentationConfig, Viewpoint, REFERENCE_DISTANCE_M, REFERENCE_ZOOM,
};

use std::collections::{btree_set, BTreeSet, VecDeque};

use tracing::trace;

use crate::area::BoundedArea;
use crate::coord::LocalProjection;
use crate::tile::TileAddress;

use culling::TileQuad;

/// Set of tiles produced by one segmentation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    tiles: BTreeSet<TileAddress>,
}

impl Segmentation {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, tile: &TileAddress) -> bool {
        self.tiles.contains(tile)
    }

    pub fn iter(&self) -> btree_set::Iter<'_, TileAddress> {
        self.tiles.iter()
    }

    /// Tiles in `self` that are not in `other`.
    pub fn difference<'a>(
        &'a self,
        other: &'a Segmentation,
    ) -> impl Iterator<Item = &'a TileAddress> + 'a {
        self.tiles.difference(&other.tiles)
    }

    pub fn min_zoom(&self) -> Option<u8> {
        self.tiles.iter().map(|t| t.zoom).min()
    }

    pub fn max_zoom(&self) -> Option<u8> {
        self.tiles.iter().map(|t| t.zoom).max()
    }
}

impl FromIterator<TileAddress> for Segmentation {
    fn from_iter<I: IntoIterator<Item = TileAddress>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Segmentation {
    type Item = &'a TileAddress;
    type IntoIter = btree_set::Iter<'a, TileAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

impl IntoIterator for Segmentation {
    type Item = TileAddress;
    type IntoIter = btree_set::IntoIter<TileAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.into_iter()
    }
}

/// Computes adaptive tile coverings.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmentationConfig,
}

impl Segmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segments `area` as seen from `viewpoint`.
    ///
    /// `projection` places tiles in the same local frame as the viewpoint.
    pub fn segment(
        &self,
        area: &BoundedArea,
        viewpoint: &Viewpoint,
        projection: &LocalProjection,
    ) -> Segmentation {
        if area.is_degenerate() {
            return self.segment_point(area, viewpoint, projection);
        }

        let mut queue: VecDeque<TileAddress> = self.initial_covering(area).collect();
        let mut tiles = BTreeSet::new();
        let mut culled = 0usize;

        while let Some(tile) = queue.pop_front() {
            let quad = TileQuad::new(&tile, projection);

            if let Some(culling) = &self.config.culling {
                if !quad.is_in_view(viewpoint, culling) {
                    culled += 1;
                    continue;
                }
            }

            let target = self.config.target_zoom(quad.nearest_distance(viewpoint));
            if tile.zoom >= target || tile.zoom >= self.config.effective_zoom_max() {
                tiles.insert(tile);
                continue;
            }

            for child in tile.children() {
                if !self.config.refine_inside_area_only || area.intersects(&child.area()) {
                    queue.push_back(child);
                }
            }
        }

        trace!(
            tiles = tiles.len(),
            culled,
            "Segmented {}",
            area
        );
        Segmentation { tiles }
    }

    /// Coarse covering of `area` used to seed the work queue.
    ///
    /// Walks up from `zoom_min` and keeps the deepest zoom whose tile count
    /// fits the upper bound of the target window, stopping as soon as the
    /// lower bound is reached. When even `zoom_min` is over budget the
    /// `zoom_min` covering is used as is.
    pub fn initial_covering(&self, area: &BoundedArea) -> impl Iterator<Item = TileAddress> {
        let min_count = *self.config.target_tile_count.start() as u64;
        let max_count = *self.config.target_tile_count.end() as u64;
        let zoom_max = self.config.effective_zoom_max();

        let mut chosen = area.tile_range(self.config.zoom_min);
        for zoom in self.config.zoom_min..=zoom_max {
            let range = area.tile_range(zoom);
            let count = range.tile_count();
            if count > max_count && zoom > self.config.zoom_min {
                break;
            }
            chosen = range;
            if count >= min_count {
                break;
            }
        }

        let tiles: Vec<TileAddress> = chosen.tiles().collect();
        tiles.into_iter()
    }

    fn segment_point(
        &self,
        area: &BoundedArea,
        viewpoint: &Viewpoint,
        projection: &LocalProjection,
    ) -> Segmentation {
        let point = area.midpoint();
        let ground = projection.to_local(&point);
        let distance = viewpoint.position.distance(&ground);
        let zoom = self.config.target_zoom(distance);
        let (x, y) = crate::coord::point_to_tile_coordinate(&point, zoom);

        std::iter::once(TileAddress::new(x, y, zoom)).collect()
    }
}
