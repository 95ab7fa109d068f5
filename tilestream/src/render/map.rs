//! Concurrent map of rendered tiles.

use std::sync::Arc;

use dashmap::DashMap;

use crate::tile::{Direction, TileAddress};

use super::RenderedTile;

/// How many zoom levels below a same-zoom neighbor the lookup descends.
pub const MAX_NEIGHBOR_DESCENT: u8 = 4;

/// Rendered tiles keyed by address.
///
/// Iteration helpers collect snapshots so no shard lock is held while
/// callers touch the tiles.
#[derive(Debug, Default)]
pub struct TileMap {
    tiles: DashMap<TileAddress, Arc<RenderedTile>>,
}

impl TileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tile: &TileAddress) -> Option<Arc<RenderedTile>> {
        self.tiles.get(tile).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, tile: &TileAddress) -> bool {
        self.tiles.contains_key(tile)
    }

    /// Inserts a tile, returning the one it replaced.
    pub fn insert(&self, tile: Arc<RenderedTile>) -> Option<Arc<RenderedTile>> {
        self.tiles.insert(tile.address(), tile)
    }

    pub fn remove(&self, tile: &TileAddress) -> Option<Arc<RenderedTile>> {
        self.tiles.remove(tile).map(|(_, t)| t)
    }

    /// Removes the entry only if it still holds `tile`.
    pub fn remove_exact(&self, tile: &Arc<RenderedTile>) -> bool {
        self.tiles
            .remove_if(&tile.address(), |_, current| Arc::ptr_eq(current, tile))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Sorted snapshot of the addresses.
    pub fn addresses(&self) -> Vec<TileAddress> {
        let mut addresses: Vec<TileAddress> = self.tiles.iter().map(|e| *e.key()).collect();
        addresses.sort();
        addresses
    }

    /// Snapshot of all tiles in address order.
    pub fn snapshot(&self) -> Vec<Arc<RenderedTile>> {
        let mut tiles: Vec<Arc<RenderedTile>> =
            self.tiles.iter().map(|e| Arc::clone(e.value())).collect();
        tiles.sort_by_key(|t| t.address());
        tiles
    }

    /// Calls `f` for every live tile sharing an edge with `tile`, together
    /// with the direction from `tile` toward it.
    ///
    /// For each direction the same-zoom neighbor address is resolved to the
    /// nearest present tile among itself and its ancestors, plus any present
    /// descendants along the shared edge. Tiles being removed are skipped.
    pub fn for_each_rendered_neighbor<F>(&self, tile: &TileAddress, mut f: F)
    where
        F: FnMut(&Arc<RenderedTile>, Direction),
    {
        for direction in Direction::ALL {
            let Some(neighbor) = tile.neighbor(direction) else {
                continue;
            };

            for zoom in (0..=neighbor.zoom).rev() {
                let Some(candidate) = neighbor.ancestor(zoom) else {
                    break;
                };
                if candidate.contains(tile) {
                    // shared ancestor: it overlaps `tile` rather than bordering it
                    break;
                }
                if let Some(found) = self.live(&candidate) {
                    f(&found, direction);
                    break;
                }
            }

            for depth in 1..=MAX_NEIGHBOR_DESCENT {
                for candidate in edge_descendants(&neighbor, direction.opposite(), depth) {
                    if let Some(found) = self.live(&candidate) {
                        f(&found, direction);
                    }
                }
            }
        }
    }

    fn live(&self, tile: &TileAddress) -> Option<Arc<RenderedTile>> {
        self.get(tile).filter(|t| !t.is_removing())
    }
}

/// Descendants of `tile` at `depth` levels down lying along its `edge`.
fn edge_descendants(tile: &TileAddress, edge: Direction, depth: u8) -> Vec<TileAddress> {
    let zoom = tile.zoom.saturating_add(depth);
    if zoom > crate::coord::MAX_ZOOM {
        return Vec::new();
    }
    let span = 1u32 << depth;
    let (x0, y0) = (tile.x << depth, tile.y << depth);

    (0..span)
        .map(|i| match edge {
            Direction::North => TileAddress::new(x0 + i, y0, zoom),
            Direction::South => TileAddress::new(x0 + i, y0 + span - 1, zoom),
            Direction::West => TileAddress::new(x0, y0 + i, zoom),
            Direction::East => TileAddress::new(x0 + span - 1, y0 + i, zoom),
        })
        .collect()
}
