//! Render host that logs instead of drawing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use tilestream::render::{HeightMesh, RenderError, RenderHost, RenderTarget, Texture};
use tilestream::tile::TileAddress;

#[derive(Debug, Default)]
struct Counters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    textures: AtomicUsize,
    meshes: AtomicUsize,
}

/// Counts and logs every call it receives.
#[derive(Debug, Default)]
pub struct LoggingHost {
    counters: Arc<Counters>,
}

/// Host call totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTotals {
    pub created: usize,
    pub destroyed: usize,
    pub textures: usize,
    pub meshes: usize,
}

impl LoggingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> HostTotals {
        let c = &self.counters;
        HostTotals {
            created: c.created.load(Ordering::Relaxed),
            destroyed: c.destroyed.load(Ordering::Relaxed),
            textures: c.textures.load(Ordering::Relaxed),
            meshes: c.meshes.load(Ordering::Relaxed),
        }
    }
}

impl RenderHost for LoggingHost {
    fn create_target(&self, tile: TileAddress) -> Arc<dyn RenderTarget> {
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        debug!(%tile, "Target created");
        Arc::new(LoggingTarget {
            tile,
            counters: Arc::clone(&self.counters),
        })
    }
}

struct LoggingTarget {
    tile: TileAddress,
    counters: Arc<Counters>,
}

impl RenderTarget for LoggingTarget {
    fn set_texture(&self, texture: &Texture) -> Result<(), RenderError> {
        self.counters.textures.fetch_add(1, Ordering::Relaxed);
        trace!(tile = %self.tile, width = texture.width(), height = texture.height(), "Texture set");
        Ok(())
    }

    fn set_mesh(&self, mesh: &HeightMesh) -> Result<(), RenderError> {
        self.counters.meshes.fetch_add(1, Ordering::Relaxed);
        trace!(tile = %self.tile, resolution = mesh.resolution(), "Mesh set");
        Ok(())
    }

    fn clear_texture(&self) {
        trace!(tile = %self.tile, "Texture cleared");
    }

    fn clear_mesh(&self) {
        trace!(tile = %self.tile, "Mesh cleared");
    }

    fn set_opacity(&self, _opacity: f32) {}

    fn set_draw_offset(&self, offset: f64) {
        trace!(tile = %self.tile, offset, "Draw offset");
    }

    fn destroy(&self) {
        self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
        debug!(tile = %self.tile, "Target destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let host = LoggingHost::new();
        let target = host.create_target(TileAddress::new(0, 0, 1));
        target.set_texture(&Texture::solid(1, 1, [0; 4])).unwrap();
        target.set_mesh(&HeightMesh::flat(2, 0.0)).unwrap();
        target.destroy();

        assert_eq!(
            host.totals(),
            HostTotals {
                created: 1,
                destroyed: 1,
                textures: 1,
                meshes: 1,
            }
        );
    }
}
