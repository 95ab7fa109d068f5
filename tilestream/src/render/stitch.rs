//! Edge stitching between neighbors of different zoom.
//!
//! A finer tile's edge has more vertices per metre than the coarser tile it
//! borders, so the two edges only meet at the coarse vertices. Stitching
//! moves each fine edge vertex onto the coarse edge by interpolating the
//! coarse samples at the fine vertex position.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::tile::{Direction, TileAddress};

use super::{EdgeSample, HeightMesh, RenderedTile, TileMap};

/// Stitches `tile` against its rendered neighbors.
///
/// Coarser neighbors are copied into `tile`'s edges. When `recurse` is set,
/// each finer neighbor is stitched against its own neighbors once, with
/// recursion disabled.
pub fn stitch_tile(map: &TileMap, tile: &Arc<RenderedTile>, recurse: bool) {
    let address = tile.address();
    let mut coarser = Vec::new();
    let mut finer = Vec::new();

    map.for_each_rendered_neighbor(&address, |neighbor, direction| {
        let other = neighbor.address();
        if other.zoom < address.zoom {
            coarser.push((Arc::clone(neighbor), direction));
        } else if other.zoom > address.zoom {
            finer.push(Arc::clone(neighbor));
        }
    });

    for (neighbor, direction) in coarser {
        stitch_edge(tile, &neighbor, direction);
    }

    if recurse {
        for neighbor in finer {
            stitch_tile(map, &neighbor, false);
        }
    }
}

/// Copies the edge of `coarse` into the `direction` edge of `fine`.
fn stitch_edge(fine: &RenderedTile, coarse: &RenderedTile, direction: Direction) {
    let (Some(fine_mesh), Some(coarse_mesh)) = (fine.mesh(), coarse.mesh()) else {
        return;
    };
    let Some(samples) = interpolate_edge(
        &fine_mesh,
        fine.address(),
        &coarse_mesh,
        coarse.address(),
        direction,
    ) else {
        return;
    };

    let mut stitched = fine_mesh;
    stitched.set_edge(direction, &samples);
    if let Err(e) = fine.replace_mesh(stitched) {
        warn!(tile = %fine.address(), error = %e, "Failed to apply stitched mesh");
        return;
    }
    trace!(
        fine = %fine.address(),
        coarse = %coarse.address(),
        %direction,
        "Stitched edge"
    );
}

/// Samples of `coarse`'s facing edge resampled onto `fine`'s `direction`
/// edge.
///
/// Returns `None` when `coarse` is not actually a coarser tile across that
/// edge.
pub fn interpolate_edge(
    fine_mesh: &HeightMesh,
    fine: TileAddress,
    coarse_mesh: &HeightMesh,
    coarse: TileAddress,
    direction: Direction,
) -> Option<Vec<EdgeSample>> {
    let delta = fine.zoom.checked_sub(coarse.zoom)?;
    if delta == 0 {
        return None;
    }
    let scale = (1u64 << delta) as f64;

    // offset of the fine tile along the shared edge, in fine tile units
    let offset = match direction {
        Direction::North | Direction::South => fine.x as i64 - ((coarse.x as i64) << delta),
        Direction::East | Direction::West => fine.y as i64 - ((coarse.y as i64) << delta),
    };
    if offset < 0 || offset as f64 >= scale {
        return None;
    }

    let source = coarse_mesh.edge(direction.opposite());
    let last_source = source.len().checked_sub(1)?;
    let fine_count = fine_mesh.resolution();
    let last_fine = fine_count.checked_sub(1)?.max(1) as f64;

    let samples = (0..fine_count)
        .map(|i| {
            let along = (offset as f64 + i as f64 / last_fine) / scale;
            sample_edge(&source, along * last_source as f64)
        })
        .collect();
    Some(samples)
}

fn sample_edge(edge: &[EdgeSample], position: f64) -> EdgeSample {
    let last = edge.len() - 1;
    let position = position.clamp(0.0, last as f64);
    let i = (position.floor() as usize).min(last);
    let j = (i + 1).min(last);
    let t = position - i as f64;

    let a = edge[i];
    let b = edge[j];
    EdgeSample {
        height: a.height + (b.height - a.height) * t,
        normal: a.normal.lerp(b.normal, t).normalize_or_zero(),
    }
}
