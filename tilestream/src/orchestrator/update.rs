//! The update cycle.
//!
//! ```text
//!  update(viewpoint)
//!      │ moved? ── no ──► Skipped
//!      ▼
//!  cancel previous sentinel, segment request area
//!      │
//!      ▼
//!  reuse/create tiles + requests, start channels ──► FuturesUnordered
//!      │
//!      ▼
//!  select! { sentinel ──► Preempted
//!            completion ─► next / LayerFailed (retry pending) }
//!      │
//!      ▼
//!  reconcile: prune stale requests and tiles, draw order, stitch
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::area::BoundedArea;
use crate::coord::LocalProjection;
use crate::layer::{LayerCollection, LayerFailure, LayerHandle};
use crate::render::{stitch, HeightMesh, RenderHost, RenderedTile, Texture, TileMap};
use crate::segmentation::{Segmentation, Segmenter, Viewpoint};
use crate::telemetry::StreamMetrics;
use crate::tile::{AppliedHook, TaskState, TileAddress, TileRequest};

use super::config::MIN_TURN_RAD;
use super::{CycleOutcome, OrchestratorConfig, StreamEvent};

/// Cancellation token of the cycle that has not reconciled yet.
struct Sentinel {
    id: u64,
    token: CancellationToken,
}

struct CycleState {
    sentinel: Option<Sentinel>,
    last_viewpoint: Option<Viewpoint>,
    force: bool,
    retry_pending: bool,
    targets: Arc<Segmentation>,
    request_area: Option<BoundedArea>,
}

/// Drives tile requests and rendered tiles from viewpoint updates.
///
/// `update` may be called concurrently; a newer cycle preempts an older one
/// that has not reconciled yet.
pub struct UpdateOrchestrator {
    config: OrchestratorConfig,
    segmenter: Segmenter,
    projection: LocalProjection,
    host: Arc<dyn RenderHost>,
    textures: LayerCollection<Texture>,
    meshes: LayerCollection<HeightMesh>,
    tiles: Arc<TileMap>,
    requests: DashMap<TileAddress, Arc<TileRequest>>,
    state: Mutex<CycleState>,
    next_cycle: AtomicU64,
    events: broadcast::Sender<StreamEvent>,
    metrics: Arc<StreamMetrics>,
    on_applied: AppliedHook,
}

impl UpdateOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        projection: LocalProjection,
        host: Arc<dyn RenderHost>,
        textures: LayerCollection<Texture>,
        meshes: LayerCollection<HeightMesh>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let metrics = Arc::new(StreamMetrics::new());

        let on_applied: AppliedHook = {
            let events = events.clone();
            let metrics = Arc::clone(&metrics);
            Arc::new(move |tile, channel| {
                metrics.tile_updated();
                let _ = events.send(StreamEvent::TileUpdated { tile, channel });
            })
        };

        Self {
            segmenter: Segmenter::new(config.segmentation.clone()),
            config,
            projection,
            host,
            textures,
            meshes,
            tiles: Arc::new(TileMap::new()),
            requests: DashMap::new(),
            state: Mutex::new(CycleState {
                sentinel: None,
                last_viewpoint: None,
                force: false,
                retry_pending: false,
                targets: Arc::new(Segmentation::default()),
                request_area: None,
            }),
            next_cycle: AtomicU64::new(1),
            events,
            metrics,
            on_applied,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn projection(&self) -> &LocalProjection {
        &self.projection
    }

    pub fn textures(&self) -> &LayerCollection<Texture> {
        &self.textures
    }

    pub fn meshes(&self) -> &LayerCollection<HeightMesh> {
        &self.meshes
    }

    pub fn tiles(&self) -> &Arc<TileMap> {
        &self.tiles
    }

    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.metrics
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Request area of the latest started cycle.
    pub fn current_request_area(&self) -> Option<BoundedArea> {
        self.state.lock().request_area
    }

    /// Target set of the latest started cycle.
    pub fn latest_targets(&self) -> Arc<Segmentation> {
        Arc::clone(&self.state.lock().targets)
    }

    /// Cycles started but not yet reconciled or preempted. Never above one.
    pub fn active_cycles(&self) -> usize {
        usize::from(self.state.lock().sentinel.is_some())
    }

    /// Makes the next `update` run even if the viewpoint did not move.
    pub fn request_update(&self) {
        self.state.lock().force = true;
    }

    /// Advances tile fades to `now`.
    pub fn tick(&self, now: Instant) {
        for tile in self.tiles.snapshot() {
            tile.tick(now);
        }
    }

    /// Runs one update cycle for `viewpoint`.
    pub async fn update(&self, viewpoint: Viewpoint) -> CycleOutcome {
        let started = Instant::now();
        let Some((cycle, token, targets)) = self.begin_cycle(viewpoint) else {
            self.metrics.cycle_skipped();
            trace!("Viewpoint unchanged, cycle skipped");
            return CycleOutcome::Skipped;
        };
        self.metrics.cycle_started();
        debug!(cycle, tiles = targets.len(), "Cycle started");

        // Layers are re-read every cycle so failover takes effect here.
        let texture_layer = self.textures.current();
        let mesh_layer = self.meshes.current();

        let mut pending = FuturesUnordered::new();
        for &address in targets.iter() {
            let (tile, fresh) = self.tile_for(address);
            let request = self.request_for(address, fresh);
            request.ensure_started(&texture_layer, &mesh_layer, &tile, Some(&self.on_applied));
            pending.extend(request.pending());
        }

        let mut failure: Option<LayerFailure> = None;
        let mut interrupted = 0usize;
        let preempted = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break true,
                next = pending.next() => match next {
                    None => break false,
                    Some((tile, channel, TaskState::Failed(layer_failure))) => {
                        debug!(cycle, %tile, %channel, "Cycle interrupted by layer failure");
                        self.metrics.layer_failed();
                        let _ = self.events.send(StreamEvent::LayerFailed(layer_failure.clone()));
                        self.state.lock().retry_pending = true;
                        failure = Some(layer_failure);
                        break false;
                    }
                    Some((tile, channel, TaskState::Cancelled)) => {
                        trace!(cycle, %tile, %channel, "Channel cancelled");
                        interrupted += 1;
                    }
                    Some((tile, channel, state)) => {
                        trace!(cycle, %tile, %channel, ?state, "Channel settled");
                    }
                },
            }
        };

        if preempted {
            return self.preempt(cycle, &targets);
        }

        {
            let mut state = self.state.lock();
            if token.is_cancelled() {
                drop(state);
                return self.preempt(cycle, &targets);
            }
            // The lock keeps a newer cycle from starting mid-reconcile.
            self.reconcile(&targets);
            if state.sentinel.as_ref().is_some_and(|s| s.id == cycle) {
                state.sentinel = None;
            }
            // targeted tiles left without data get another cycle
            if interrupted > 0 {
                debug!(cycle, interrupted, "Cancelled channels pending retry");
                state.retry_pending = true;
            }
        }

        let elapsed = started.elapsed();
        self.metrics.set_tiles_live(self.tiles.len());
        self.metrics.cycle_completed(elapsed, failure.is_some());
        debug!(
            cycle,
            tiles = targets.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Cycle reconciled"
        );

        match failure {
            Some(failure) => CycleOutcome::CompletedWithFailure(failure),
            None => CycleOutcome::Completed,
        }
    }

    /// Cancels every request, removes every tile and clears layer caches.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if let Some(sentinel) = state.sentinel.take() {
            sentinel.token.cancel();
        }
        state.targets = Arc::new(Segmentation::default());
        state.force = true;

        self.requests.retain(|_, request| {
            request.cancel();
            false
        });
        let tiles = self.tiles.snapshot();
        for tile in &tiles {
            if !tile.is_removing() {
                self.spawn_removal(Arc::clone(tile));
            }
        }
        self.textures.clear_caches();
        self.meshes.clear_caches();
        info!(tiles = tiles.len(), "Cleared tile stream");
    }

    /// Starts a cycle under the state lock, or returns `None` when the cycle
    /// should be skipped.
    fn begin_cycle(
        &self,
        viewpoint: Viewpoint,
    ) -> Option<(u64, CancellationToken, Arc<Segmentation>)> {
        let mut state = self.state.lock();
        if !state.force && !state.retry_pending {
            if let Some(last) = &state.last_viewpoint {
                let moved = last.position.distance(&viewpoint.position);
                if moved < self.config.movement_epsilon_m && last.angle_to(&viewpoint) < MIN_TURN_RAD
                {
                    return None;
                }
            }
        }
        state.force = false;
        state.retry_pending = false;

        if let Some(previous) = state.sentinel.take() {
            previous.token.cancel();
        }

        let ground = self.projection.to_geo(&viewpoint.position);
        let half_size = self.config.request_half_size(viewpoint.position.up);
        let area = BoundedArea::around(&ground, half_size);
        let targets = Arc::new(self.segmenter.segment(&area, &viewpoint, &self.projection));

        let cycle = self.next_cycle.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        state.sentinel = Some(Sentinel {
            id: cycle,
            token: token.clone(),
        });
        state.last_viewpoint = Some(viewpoint);
        state.targets = Arc::clone(&targets);
        state.request_area = Some(area);
        Some((cycle, token, targets))
    }

    /// Returns the live tile for `address`, creating one when there is none
    /// or the existing one is being removed. The flag is `true` for a new
    /// tile.
    fn tile_for(&self, address: TileAddress) -> (Arc<RenderedTile>, bool) {
        if let Some(tile) = self.tiles.get(&address) {
            if !tile.is_removing() {
                return (tile, false);
            }
        }

        let target = self.host.create_target(address);
        let tile = Arc::new(RenderedTile::new(address, target, self.config.fade_duration));
        if let Some(displaced) = self.tiles.insert(Arc::clone(&tile)) {
            // a concurrent cycle created the same tile
            if !displaced.is_removing() {
                self.spawn_removal(displaced);
            }
        }
        trace!(%address, "Tile added");
        self.metrics.tile_added();
        let _ = self.events.send(StreamEvent::TileAdded(address));
        (tile, true)
    }

    /// Returns the request for `address`. Cancelled requests and requests
    /// bound to a replaced tile are swapped for new ones.
    fn request_for(&self, address: TileAddress, fresh_tile: bool) -> Arc<TileRequest> {
        match self.requests.entry(address) {
            Entry::Occupied(mut entry) => {
                if !fresh_tile && !entry.get().is_cancelled() {
                    return Arc::clone(entry.get());
                }
                let request = Arc::new(TileRequest::new(address));
                let previous = entry.insert(Arc::clone(&request));
                previous.cancel();
                request
            }
            Entry::Vacant(entry) => {
                let request = Arc::new(TileRequest::new(address));
                entry.insert(Arc::clone(&request));
                request
            }
        }
    }

    /// Drops this cycle's addresses that the latest cycle no longer targets.
    ///
    /// Runs under the state lock so a cycle starting meanwhile cannot pick up
    /// a request that is about to be cancelled.
    fn preempt(&self, cycle: u64, targets: &Segmentation) -> CycleOutcome {
        let mut dropped = 0usize;
        {
            let state = self.state.lock();
            for address in targets.difference(&state.targets) {
                if let Some(request) = self.requests.get(address) {
                    request.cancel();
                }
                if let Some(tile) = self.tiles.get(address) {
                    tile.adjust_draw_order(false);
                }
                dropped += 1;
            }
        }
        self.metrics.cycle_preempted();
        debug!(cycle, dropped, "Cycle preempted");
        CycleOutcome::Preempted
    }

    fn reconcile(&self, targets: &Segmentation) {
        self.requests.retain(|address, request| {
            if targets.contains(address) {
                true
            } else {
                request.cancel();
                false
            }
        });

        for tile in self.tiles.snapshot() {
            if tile.is_removing() {
                continue;
            }
            if targets.contains(&tile.address()) {
                tile.adjust_draw_order(true);
                stitch::stitch_tile(&self.tiles, &tile, true);
            } else {
                self.spawn_removal(tile);
            }
        }
    }

    fn spawn_removal(&self, tile: Arc<RenderedTile>) {
        let tiles = Arc::clone(&self.tiles);
        let events = self.events.clone();
        let metrics = Arc::clone(&self.metrics);
        let address = tile.address();
        let removal = Arc::clone(&tile).remove();
        tokio::spawn(async move {
            removal.await;
            tiles.remove_exact(&tile);
            metrics.tile_removed();
            trace!(%address, "Tile removed");
            let _ = events.send(StreamEvent::TileRemoved(address));
        });
    }
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("tiles", &self.tiles.len())
            .field("requests", &self.requests.len())
            .field("texture_layer", &self.textures.current().name().to_string())
            .field("mesh_layer", &self.meshes.current().name().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::GeoPoint;
    use crate::layer::{BoxFuture, DataLayer, Layer, LayerSettings, LayerSource, SourceError};
    use crate::provider::{FlatMeshSource, SolidColorTextureSource};
    use crate::render::recording::RecordingHost;
    use crate::segmentation::SegmentationConfig;
    use std::time::Duration;

    const FADE: Duration = Duration::from_millis(100);

    struct Delayed {
        delay: Duration,
        fail: bool,
    }

    impl LayerSource for Delayed {
        type Data = Texture;

        fn fetch<'a>(
            &'a self,
            _tile: TileAddress,
            _area: &'a BoundedArea,
        ) -> BoxFuture<'a, Result<Texture, SourceError>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                if self.fail {
                    Err(SourceError::Http("unavailable".into()))
                } else {
                    Ok(Texture::solid(1, 1, [200, 0, 0, 255]))
                }
            })
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            segmentation: SegmentationConfig {
                zoom_min: 2,
                zoom_max: 12,
                ..SegmentationConfig::default()
            },
            fade_duration: FADE,
            ..OrchestratorConfig::default()
        }
    }

    fn base_collections() -> (LayerCollection<Texture>, LayerCollection<HeightMesh>) {
        let texture: Arc<dyn Layer<Texture>> = Arc::new(
            DataLayer::new(
                LayerSettings::new("solid", crate::layer::BASE_LAYER_PRIORITY),
                SolidColorTextureSource::default(),
            )
            .unwrap(),
        );
        let mesh: Arc<dyn Layer<HeightMesh>> = Arc::new(
            DataLayer::new(
                LayerSettings::new("flat", crate::layer::BASE_LAYER_PRIORITY),
                FlatMeshSource::default(),
            )
            .unwrap(),
        );
        (LayerCollection::new(texture), LayerCollection::new(mesh))
    }

    fn setup() -> (UpdateOrchestrator, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::new());
        let (textures, meshes) = base_collections();
        let projection = LocalProjection::new(GeoPoint::new(0.1, 0.1));
        let orchestrator = UpdateOrchestrator::new(
            config(),
            projection,
            Arc::clone(&host) as Arc<dyn RenderHost>,
            textures,
            meshes,
        );
        (orchestrator, host)
    }

    fn viewpoint_at(orchestrator: &UpdateOrchestrator, lat: f64, lon: f64) -> Viewpoint {
        let local = orchestrator
            .projection()
            .to_local(&GeoPoint::with_elevation(lat, lon, 1_000.0));
        Viewpoint::looking_down(local)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_renders_every_target() {
        let (orchestrator, host) = setup();
        let mut events = orchestrator.subscribe();

        let outcome = orchestrator.update(viewpoint_at(&orchestrator, 0.1, 0.1)).await;
        assert!(matches!(outcome, CycleOutcome::Completed));
        assert_eq!(orchestrator.active_cycles(), 0);

        let targets = orchestrator.latest_targets();
        assert!(!targets.is_empty());
        assert_eq!(orchestrator.tiles().len(), targets.len());
        for address in targets.iter() {
            let tile = orchestrator.tiles().get(address).unwrap();
            assert!(tile.is_complete());
            assert_eq!(host.created(*address), 1);
        }

        let mut added = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, StreamEvent::TileAdded(_)) {
                added += 1;
            }
        }
        assert_eq!(added, targets.len());
        assert!(orchestrator.current_request_area().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_viewpoint_is_skipped() {
        let (orchestrator, _host) = setup();
        let viewpoint = viewpoint_at(&orchestrator, 0.1, 0.1);

        assert!(orchestrator.update(viewpoint).await.is_completed());
        assert!(orchestrator.update(viewpoint).await.is_skipped());

        orchestrator.request_update();
        assert!(orchestrator.update(viewpoint).await.is_completed());
        assert_eq!(orchestrator.metrics().snapshot().cycles_skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_away_removes_stale_tiles() {
        let (orchestrator, host) = setup();
        orchestrator.update(viewpoint_at(&orchestrator, 0.1, 0.1)).await;
        let old: Vec<TileAddress> = orchestrator.latest_targets().iter().copied().collect();

        orchestrator.update(viewpoint_at(&orchestrator, 0.1, 1.1)).await;
        let new = orchestrator.latest_targets();
        assert!(old.iter().all(|tile| !new.contains(tile)));

        // fade wait plus fade out
        tokio::time::sleep(FADE * 3).await;
        for tile in &old {
            assert!(!orchestrator.tiles().contains(tile));
            assert!(host.target(*tile).unwrap().is_destroyed());
        }
        assert_eq!(orchestrator.tiles().len(), new.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_cycle_preempts_older() {
        let (orchestrator, _host) = setup();
        let slow: Arc<dyn Layer<Texture>> = Arc::new(
            DataLayer::new(
                LayerSettings::new("slow", 10),
                Delayed {
                    delay: Duration::from_secs(5),
                    fail: false,
                },
            )
            .unwrap(),
        );
        orchestrator.textures().add(slow).unwrap();
        let orchestrator = Arc::new(orchestrator);

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            let viewpoint = viewpoint_at(&orchestrator, 0.1, 0.1);
            tokio::spawn(async move { orchestrator.update(viewpoint).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orchestrator.active_cycles(), 1);

        let second = orchestrator.update(viewpoint_at(&orchestrator, 0.1, 1.1)).await;
        assert!(first.await.unwrap().is_preempted());
        assert!(second.is_completed());
        assert_eq!(orchestrator.active_cycles(), 0);
        assert_eq!(orchestrator.metrics().snapshot().cycles_preempted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preempt_keeps_requests_the_latest_cycle_targets() {
        let (orchestrator, _host) = setup();
        let viewpoint = viewpoint_at(&orchestrator, 0.1, 0.1);
        orchestrator.update(viewpoint).await;
        let latest = orchestrator.latest_targets();

        // a stale cycle whose targets overlap the latest ones
        let shared = *latest.iter().next().unwrap();
        let stale_only = TileAddress::new(0, 0, 3);
        let stale: Segmentation = [shared, stale_only].into_iter().collect();
        let stale_request = orchestrator.request_for(stale_only, false);

        assert!(orchestrator.preempt(99, &stale).is_preempted());
        assert!(!orchestrator.requests.get(&shared).unwrap().is_cancelled());
        assert!(stale_request.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_target_is_retried_from_same_viewpoint() {
        let (orchestrator, _host) = setup();
        let slow: Arc<dyn Layer<Texture>> = Arc::new(
            DataLayer::new(
                LayerSettings::new("slow", 10),
                Delayed {
                    delay: Duration::from_millis(100),
                    fail: false,
                },
            )
            .unwrap(),
        );
        orchestrator.textures().add(slow).unwrap();
        let orchestrator = Arc::new(orchestrator);
        let viewpoint = viewpoint_at(&orchestrator, 0.1, 0.1);

        let cycle = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.update(viewpoint).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let victim = *orchestrator.latest_targets().iter().next().unwrap();
        orchestrator.requests.get(&victim).unwrap().cancel();

        assert!(cycle.await.unwrap().is_completed());
        assert!(!orchestrator.tiles().get(&victim).unwrap().is_complete());

        // not skipped although the viewpoint is unchanged
        assert!(orchestrator.update(viewpoint).await.is_completed());
        for address in orchestrator.latest_targets().iter() {
            assert!(orchestrator.tiles().get(address).unwrap().is_complete());
        }
        assert!(orchestrator.update(viewpoint).await.is_skipped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_layer_failure_falls_back_on_retry() {
        let (orchestrator, _host) = setup();
        let broken: Arc<dyn Layer<Texture>> = Arc::new(
            DataLayer::new(
                LayerSettings::new("broken", 10),
                Delayed {
                    delay: Duration::ZERO,
                    fail: true,
                },
            )
            .unwrap(),
        );
        let broken_id = broken.id();
        orchestrator.textures().add(broken).unwrap();
        let mut events = orchestrator.subscribe();
        let viewpoint = viewpoint_at(&orchestrator, 0.1, 0.1);

        match orchestrator.update(viewpoint).await {
            CycleOutcome::CompletedWithFailure(failure) => assert_eq!(failure.layer_id(), broken_id),
            other => panic!("unexpected outcome {}", other),
        }
        assert_ne!(orchestrator.textures().current().id(), broken_id);
        // let the remaining channels of the broken layer settle
        tokio::time::sleep(Duration::from_millis(1)).await;

        // the retry runs although the viewpoint did not move
        assert!(matches!(
            orchestrator.update(viewpoint).await,
            CycleOutcome::Completed
        ));
        for tile in orchestrator.latest_targets().iter() {
            assert!(orchestrator.tiles().get(tile).unwrap().is_complete());
        }

        let mut failures = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, StreamEvent::LayerFailed(_)) {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_removes_everything() {
        let (orchestrator, host) = setup();
        let viewpoint = viewpoint_at(&orchestrator, 0.1, 0.1);
        orchestrator.update(viewpoint).await;
        let tiles = orchestrator.tiles().addresses();

        orchestrator.clear();
        tokio::time::sleep(FADE * 3).await;
        assert!(orchestrator.tiles().is_empty());
        assert!(host.live_tiles().is_empty());

        // clear forces the next cycle
        assert!(orchestrator.update(viewpoint).await.is_completed());
        assert_eq!(orchestrator.tiles().len(), tiles.len());
    }
}
