//! Per-tile rendering state machine.
//!
//! Each channel (texture, mesh) is either empty or assigned with a priority:
//!
//! ```text
//!   Empty ──write(p)──► Assigned(p) ──write(q >= p)──► Assigned(q)
//!     ▲                     │
//!     └─────── clear ───────┘          write(q < p) is dropped
//! ```
//!
//! The tile fades in once both channels hold data and fades out before it is
//! destroyed.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::tile::TileAddress;

use super::{HeightMesh, RenderError, RenderTarget, Texture};

/// Initial draw offset of freshly assigned tiles.
pub const DRAW_ORDER_BIAS: f64 = 4.0;

/// Offsets below this snap to zero during incremental decay.
pub const DRAW_ORDER_SNAP: f64 = 0.05;

/// Delayed draw-order fix-ups wait this many fade durations.
pub const DELAYED_FIXUP_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fade {
    Idle,
    In(Instant),
    Out(Instant),
}

#[derive(Debug)]
struct TileState {
    texture_priority: Option<i32>,
    mesh_priority: Option<i32>,
    mesh: Option<HeightMesh>,
    fade: Fade,
    opacity: f32,
    draw_offset: f64,
}

/// Rendering state of one tile address.
pub struct RenderedTile {
    address: TileAddress,
    target: Arc<dyn RenderTarget>,
    fade_duration: Duration,
    state: Mutex<TileState>,
    removing: AtomicBool,
    destroyed: AtomicBool,
}

impl RenderedTile {
    /// Wraps a host target. The tile starts invisible with both channels empty.
    pub fn new(address: TileAddress, target: Arc<dyn RenderTarget>, fade_duration: Duration) -> Self {
        target.set_opacity(0.0);
        Self {
            address,
            target,
            fade_duration,
            state: Mutex::new(TileState {
                texture_priority: None,
                mesh_priority: None,
                mesh: None,
                fade: Fade::Idle,
                opacity: 0.0,
                draw_offset: 0.0,
            }),
            removing: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> TileAddress {
        self.address
    }

    pub fn fade_duration(&self) -> Duration {
        self.fade_duration
    }

    pub fn texture_priority(&self) -> Option<i32> {
        self.state.lock().texture_priority
    }

    pub fn mesh_priority(&self) -> Option<i32> {
        self.state.lock().mesh_priority
    }

    /// Both channels hold data.
    pub fn is_complete(&self) -> bool {
        let state = self.state.lock();
        state.texture_priority.is_some() && state.mesh_priority.is_some()
    }

    pub fn opacity(&self) -> f32 {
        self.state.lock().opacity
    }

    pub fn draw_offset(&self) -> f64 {
        self.state.lock().draw_offset
    }

    pub fn is_removing(&self) -> bool {
        self.removing.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Last mesh applied to the target, including stitched edges.
    pub fn mesh(&self) -> Option<HeightMesh> {
        self.state.lock().mesh.clone()
    }

    /// Applies a texture if `priority` is not below the channel's current one.
    ///
    /// Returns `Ok(false)` when the write was dropped.
    pub fn set_texture(&self, texture: &Texture, priority: i32) -> Result<bool, RenderError> {
        if self.is_removing() {
            return Ok(false);
        }
        let mut state = self.state.lock();
        if state.texture_priority.is_some_and(|p| priority < p) {
            trace!(tile = %self.address, priority, "Dropped lower priority texture");
            return Ok(false);
        }

        self.target.set_texture(texture)?;
        let fresh = state.texture_priority.replace(priority).is_none();
        if fresh {
            let mesh_assigned = state.mesh_priority.is_some();
            self.on_fresh_assignment(&mut state, mesh_assigned);
        }
        Ok(true)
    }

    /// Applies a mesh if `priority` is not below the channel's current one.
    ///
    /// Returns `Ok(false)` when the write was dropped.
    pub fn set_mesh(&self, mesh: &HeightMesh, priority: i32) -> Result<bool, RenderError> {
        if self.is_removing() {
            return Ok(false);
        }
        let mut state = self.state.lock();
        if state.mesh_priority.is_some_and(|p| priority < p) {
            trace!(tile = %self.address, priority, "Dropped lower priority mesh");
            return Ok(false);
        }

        self.target.set_mesh(mesh)?;
        state.mesh = Some(mesh.clone());
        let fresh = state.mesh_priority.replace(priority).is_none();
        if fresh {
            let texture_assigned = state.texture_priority.is_some();
            self.on_fresh_assignment(&mut state, texture_assigned);
        }
        Ok(true)
    }

    pub fn clear_texture(&self) {
        let mut state = self.state.lock();
        state.texture_priority = None;
        self.target.clear_texture();
    }

    pub fn clear_mesh(&self) {
        let mut state = self.state.lock();
        state.mesh_priority = None;
        state.mesh = None;
        self.target.clear_mesh();
    }

    /// Replaces the stored mesh without touching priorities. Used by edge
    /// stitching.
    pub(crate) fn replace_mesh(&self, mesh: HeightMesh) -> Result<(), RenderError> {
        if self.is_removing() {
            return Ok(());
        }
        let mut state = self.state.lock();
        if state.mesh_priority.is_none() {
            return Ok(());
        }
        self.target.set_mesh(&mesh)?;
        state.mesh = Some(mesh);
        Ok(())
    }

    fn on_fresh_assignment(&self, state: &mut TileState, other_assigned: bool) {
        state.draw_offset = DRAW_ORDER_BIAS;
        self.target.set_draw_offset(state.draw_offset);

        if other_assigned {
            if self.fade_duration.is_zero() {
                state.fade = Fade::Idle;
                self.push_opacity(state, 1.0);
            } else {
                state.fade = Fade::In(Instant::now());
            }
        }
    }

    /// Relaxes the draw-order bias.
    ///
    /// Non-delayed calls halve the offset and snap it to zero once small.
    /// Delayed calls zero it after [`DELAYED_FIXUP_FACTOR`] fade durations,
    /// unless the tile is being removed by then.
    pub fn adjust_draw_order(self: &Arc<Self>, delayed: bool) {
        if !delayed {
            let mut state = self.state.lock();
            let halved = state.draw_offset / 2.0;
            state.draw_offset = if halved.abs() < DRAW_ORDER_SNAP {
                0.0
            } else {
                halved
            };
            self.target.set_draw_offset(state.draw_offset);
            return;
        }

        let tile = Arc::clone(self);
        let delay = self.fade_duration.mul_f64(DELAYED_FIXUP_FACTOR);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tile.is_removing() {
                return;
            }
            let mut state = tile.state.lock();
            state.draw_offset = 0.0;
            tile.target.set_draw_offset(0.0);
        });
    }

    /// Advances fades to `now` and pushes the resulting opacity.
    pub fn tick(&self, now: Instant) {
        let mut state = self.state.lock();
        let (opacity, done) = match state.fade {
            Fade::Idle => return,
            Fade::In(started) => {
                let p = self.progress(started, now);
                (p, p >= 1.0)
            }
            Fade::Out(started) => {
                let p = self.progress(started, now);
                (1.0 - p, p >= 1.0)
            }
        };
        if done {
            state.fade = Fade::Idle;
        }
        self.push_opacity(&mut state, opacity);
    }

    fn progress(&self, started: Instant, now: Instant) -> f32 {
        if self.fade_duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(started);
        (elapsed.as_secs_f64() / self.fade_duration.as_secs_f64()).min(1.0) as f32
    }

    fn push_opacity(&self, state: &mut TileState, opacity: f32) {
        state.opacity = opacity.clamp(0.0, 1.0);
        self.target.set_opacity(state.opacity);
    }

    /// Fades the tile out and destroys its target.
    ///
    /// The sequence is: mark removal, wait one fade duration, fade out over
    /// a second fade duration, destroy. The tile is marked as removing as
    /// soon as this is called, before the returned future is polled.
    /// Repeated calls resolve immediately.
    pub fn remove(self: Arc<Self>) -> impl Future<Output = ()> + Send + 'static {
        let first = !self.removing.swap(true, Ordering::AcqRel);
        if first {
            debug!(tile = %self.address, "Removing tile");
        }
        async move {
            if first {
                self.fade_out_and_destroy().await;
            }
        }
    }

    async fn fade_out_and_destroy(&self) {
        tokio::time::sleep(self.fade_duration).await;
        {
            let mut state = self.state.lock();
            state.fade = Fade::Out(Instant::now());
            // a tile that never became visible has nothing to fade
            if state.opacity <= 0.0 {
                state.fade = Fade::Idle;
            }
        }

        tokio::time::sleep(self.fade_duration).await;
        {
            let mut state = self.state.lock();
            state.fade = Fade::Idle;
            self.push_opacity(&mut state, 0.0);
        }

        if self.destroyed.swap(true, Ordering::AcqRel) {
            warn!(tile = %self.address, "Tile destroyed twice");
            return;
        }
        self.target.destroy();
    }
}

impl std::fmt::Debug for RenderedTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedTile")
            .field("address", &self.address)
            .field("state", &*self.state.lock())
            .field("removing", &self.is_removing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::{RecordingHost, TargetEvent};
    use crate::render::RenderHost;

    const FADE: Duration = Duration::from_millis(100);

    fn tile_with_host() -> (Arc<RenderedTile>, RecordingHost) {
        let host = RecordingHost::new();
        let address = TileAddress::new(1, 2, 3);
        let tile = Arc::new(RenderedTile::new(address, host.create_target(address), FADE));
        (tile, host)
    }

    #[test]
    fn test_lower_priority_write_is_dropped() {
        let (tile, _host) = tile_with_host();
        let tex = Texture::solid(1, 1, [0, 0, 0, 255]);

        assert!(tile.set_texture(&tex, 5).unwrap());
        assert!(!tile.set_texture(&tex, 1).unwrap());
        assert_eq!(tile.texture_priority(), Some(5));
        assert!(tile.set_texture(&tex, 5).unwrap());
    }

    #[test]
    fn test_arrival_order_does_not_change_outcome() {
        let low = Texture::solid(1, 1, [1, 1, 1, 255]);
        let high = Texture::solid(1, 1, [9, 9, 9, 255]);

        let (a, host_a) = tile_with_host();
        a.set_texture(&low, 1).unwrap();
        a.set_texture(&high, 5).unwrap();

        let (b, host_b) = tile_with_host();
        b.set_texture(&high, 5).unwrap();
        b.set_texture(&low, 1).unwrap();

        assert_eq!(a.texture_priority(), b.texture_priority());
        let addr = a.address();
        assert_eq!(host_a.current_texture(addr), Some(high.clone()));
        assert_eq!(host_b.current_texture(addr), Some(high));
    }

    #[test]
    fn test_clear_resets_channel() {
        let (tile, _host) = tile_with_host();
        let tex = Texture::solid(1, 1, [0, 0, 0, 255]);
        tile.set_texture(&tex, 5).unwrap();
        tile.clear_texture();
        assert_eq!(tile.texture_priority(), None);
        assert!(tile.set_texture(&tex, 1).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_in_starts_when_second_channel_arrives() {
        let (tile, _host) = tile_with_host();
        tile.set_texture(&Texture::solid(1, 1, [0; 4]), 1).unwrap();
        tile.tick(Instant::now() + FADE);
        assert_eq!(tile.opacity(), 0.0);

        tile.set_mesh(&HeightMesh::flat(2, 0.0), 1).unwrap();
        let start = Instant::now();
        tile.tick(start + FADE / 2);
        assert!((tile.opacity() - 0.5).abs() < 1e-3);
        tile.tick(start + FADE);
        assert_eq!(tile.opacity(), 1.0);
    }

    #[test]
    fn test_fresh_assignment_biases_draw_order() {
        let (tile, _host) = tile_with_host();
        tile.set_mesh(&HeightMesh::flat(2, 0.0), 1).unwrap();
        assert_eq!(tile.draw_offset(), DRAW_ORDER_BIAS);

        tile.adjust_draw_order(false);
        assert_eq!(tile.draw_offset(), DRAW_ORDER_BIAS / 2.0);
        for _ in 0..10 {
            tile.adjust_draw_order(false);
        }
        assert_eq!(tile.draw_offset(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_fixup_snaps_to_zero() {
        let (tile, _host) = tile_with_host();
        tile.set_mesh(&HeightMesh::flat(2, 0.0), 1).unwrap();

        tile.adjust_draw_order(true);
        tokio::time::sleep(FADE).await;
        assert_eq!(tile.draw_offset(), DRAW_ORDER_BIAS);
        tokio::time::sleep(FADE * 2).await;
        assert_eq!(tile.draw_offset(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_fades_out_before_destroy() {
        let (tile, host) = tile_with_host();
        let addr = tile.address();
        tile.set_texture(&Texture::solid(1, 1, [0; 4]), 1).unwrap();
        tile.set_mesh(&HeightMesh::flat(2, 0.0), 1).unwrap();
        tile.tick(Instant::now() + FADE);
        assert_eq!(tile.opacity(), 1.0);

        let removal = tokio::spawn(Arc::clone(&tile).remove());
        tokio::time::sleep(FADE / 2).await;
        assert!(tile.is_removing());
        assert!(!tile.is_destroyed());

        removal.await.unwrap();
        assert!(tile.is_destroyed());
        assert_eq!(tile.opacity(), 0.0);

        let events = host.events(addr);
        let destroy_at = events
            .iter()
            .position(|e| *e == TargetEvent::Destroy)
            .unwrap();
        assert_eq!(events[destroy_at - 1], TargetEvent::Opacity(0.0));
        assert_eq!(destroy_at, events.len() - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_after_removal_are_ignored() {
        let (tile, _host) = tile_with_host();
        let removal = tokio::spawn(Arc::clone(&tile).remove());
        tokio::task::yield_now().await;
        assert!(!tile.set_texture(&Texture::solid(1, 1, [0; 4]), 9).unwrap());
        removal.await.unwrap();
    }
}
