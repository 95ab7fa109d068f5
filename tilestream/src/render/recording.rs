//! In-memory render host that records every call.
//!
//! Useful for headless runs and for asserting on the exact sequence of
//! operations a tile's target received.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::tile::TileAddress;

use super::{HeightMesh, RenderError, RenderHost, RenderTarget, Texture};

/// One call received by a [`RecordingTarget`].
#[derive(Debug, Clone, PartialEq)]
pub enum TargetEvent {
    Texture,
    Mesh,
    ClearTexture,
    ClearMesh,
    Opacity(f32),
    DrawOffset(f64),
    Destroy,
}

#[derive(Debug, Default)]
struct TargetLog {
    events: Vec<TargetEvent>,
    texture: Option<Texture>,
    mesh: Option<HeightMesh>,
    destroyed: bool,
}

/// Render target that keeps its last texture and mesh plus a call log.
#[derive(Debug)]
pub struct RecordingTarget {
    address: TileAddress,
    log: Mutex<TargetLog>,
}

impl RecordingTarget {
    pub fn events(&self) -> Vec<TargetEvent> {
        self.log.lock().events.clone()
    }

    pub fn texture(&self) -> Option<Texture> {
        self.log.lock().texture.clone()
    }

    pub fn mesh(&self) -> Option<HeightMesh> {
        self.log.lock().mesh.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.log.lock().destroyed
    }

    fn record(&self, event: TargetEvent) {
        self.log.lock().events.push(event);
    }

    fn check_alive(&self) -> Result<(), RenderError> {
        if self.log.lock().destroyed {
            return Err(RenderError::Destroyed(self.address));
        }
        Ok(())
    }
}

impl RenderTarget for RecordingTarget {
    fn set_texture(&self, texture: &Texture) -> Result<(), RenderError> {
        self.check_alive()?;
        let mut log = self.log.lock();
        log.texture = Some(texture.clone());
        log.events.push(TargetEvent::Texture);
        Ok(())
    }

    fn set_mesh(&self, mesh: &HeightMesh) -> Result<(), RenderError> {
        self.check_alive()?;
        let mut log = self.log.lock();
        log.mesh = Some(mesh.clone());
        log.events.push(TargetEvent::Mesh);
        Ok(())
    }

    fn clear_texture(&self) {
        let mut log = self.log.lock();
        log.texture = None;
        log.events.push(TargetEvent::ClearTexture);
    }

    fn clear_mesh(&self) {
        let mut log = self.log.lock();
        log.mesh = None;
        log.events.push(TargetEvent::ClearMesh);
    }

    fn set_opacity(&self, opacity: f32) {
        self.record(TargetEvent::Opacity(opacity));
    }

    fn set_draw_offset(&self, offset: f64) {
        self.record(TargetEvent::DrawOffset(offset));
    }

    fn destroy(&self) {
        let mut log = self.log.lock();
        log.destroyed = true;
        log.events.push(TargetEvent::Destroy);
    }
}

/// Host handing out [`RecordingTarget`]s.
///
/// When several targets are created for the same address (a tile removed and
/// re-added), lookups return the most recent one.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    targets: Arc<Mutex<HashMap<TileAddress, Vec<Arc<RecordingTarget>>>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent target created for `tile`.
    pub fn target(&self, tile: TileAddress) -> Option<Arc<RecordingTarget>> {
        self.targets
            .lock()
            .get(&tile)
            .and_then(|targets| targets.last().cloned())
    }

    /// Number of targets ever created for `tile`.
    pub fn created(&self, tile: TileAddress) -> usize {
        self.targets.lock().get(&tile).map_or(0, Vec::len)
    }

    pub fn events(&self, tile: TileAddress) -> Vec<TargetEvent> {
        self.target(tile).map(|t| t.events()).unwrap_or_default()
    }

    pub fn current_texture(&self, tile: TileAddress) -> Option<Texture> {
        self.target(tile).and_then(|t| t.texture())
    }

    pub fn current_mesh(&self, tile: TileAddress) -> Option<HeightMesh> {
        self.target(tile).and_then(|t| t.mesh())
    }

    /// Addresses whose most recent target has not been destroyed.
    pub fn live_tiles(&self) -> Vec<TileAddress> {
        let mut tiles: Vec<TileAddress> = self
            .targets
            .lock()
            .iter()
            .filter(|(_, targets)| targets.last().is_some_and(|t| !t.is_destroyed()))
            .map(|(addr, _)| *addr)
            .collect();
        tiles.sort();
        tiles
    }
}

impl RenderHost for RecordingHost {
    fn create_target(&self, tile: TileAddress) -> Arc<dyn RenderTarget> {
        let target = Arc::new(RecordingTarget {
            address: tile,
            log: Mutex::new(TargetLog::default()),
        });
        self.targets
            .lock()
            .entry(tile)
            .or_default()
            .push(Arc::clone(&target));
        target
    }
}
