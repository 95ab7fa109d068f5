//! Cached, throttled and cancellable layer over a [`LayerSource`].
//!
//! Every request goes through the same steps:
//!
//! 1. Return early if the request is already cancelled.
//! 2. Serve from the result cache, keyed by the requested area.
//! 3. Wait for a gate permit; at most `max_parallel_requests` fetches run.
//! 4. Run the fetch, racing the cancellation token.
//! 5. Hand the permit back, after a delay when a rate cap is set.
//!
//! A failed fetch or render deactivates the layer. The failure carries the
//! layer handle so the caller can fall back to the next candidate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::area::BoundedArea;
use crate::events::{Observers, SubscriptionId};
use crate::render::{Channel, RenderedTile};
use crate::tile::TileAddress;

use super::stats::LayerStats;
use super::{
    BoxFuture, FailureReason, Layer, LayerError, LayerFailure, LayerHandle, LayerId,
    LayerSettings, LayerSource, LayerStatistics, Renderable, SettingsError,
};

pub struct DataLayer<S: LayerSource> {
    id: LayerId,
    settings: LayerSettings,
    source: S,
    cache: Option<Cache<BoundedArea, S::Data>>,
    gate: Arc<Semaphore>,
    active: AtomicBool,
    active_observers: Observers<bool>,
    stats: LayerStats,
}

impl<S: LayerSource> DataLayer<S> {
    /// Creates an active layer.
    pub fn new(settings: LayerSettings, source: S) -> Result<Self, SettingsError> {
        settings.validate()?;
        let cache = (settings.cache_capacity() > 0)
            .then(|| Cache::builder().max_capacity(settings.cache_capacity()).build());

        Ok(Self {
            id: LayerId::next(),
            gate: Arc::new(Semaphore::new(settings.max_parallel_requests())),
            settings,
            source,
            cache,
            active: AtomicBool::new(true),
            active_observers: Observers::new(),
            stats: LayerStats::default(),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Gate permits not currently held by a fetch or a rate-limit delay.
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    /// Fetches the data for `tile`, serving repeated areas from the cache.
    pub async fn request(
        self: &Arc<Self>,
        tile: TileAddress,
        area: &BoundedArea,
        cancel: &CancellationToken,
    ) -> Result<S::Data, LayerError> {
        if cancel.is_cancelled() {
            self.stats.record_cancellation();
            return Err(LayerError::Cancelled);
        }
        self.stats.record_request();

        if let Some(cache) = &self.cache {
            if let Some(data) = cache.get(area).await {
                self.stats.record_cache_hit();
                trace!(layer = %self.settings.name(), %tile, "Cache hit");
                return Ok(data);
            }
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.stats.record_cancellation();
                return Err(LayerError::Cancelled);
            }
            // the gate is never closed
            permit = Arc::clone(&self.gate).acquire_owned() => {
                permit.map_err(|_| LayerError::Cancelled)?
            }
        };

        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.source.fetch(tile, area) => Some(result),
        };
        let elapsed = started.elapsed();
        self.release(permit, elapsed);

        match outcome {
            None => {
                self.stats.record_cancellation();
                trace!(layer = %self.settings.name(), %tile, "Fetch cancelled");
                Err(LayerError::Cancelled)
            }
            Some(Ok(data)) => {
                self.stats.record_request_time(elapsed);
                if let Some(cache) = &self.cache {
                    cache.insert(*area, data.clone()).await;
                }
                debug!(
                    layer = %self.settings.name(),
                    %tile,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Fetched"
                );
                Ok(data)
            }
            Some(Err(e)) => {
                self.stats.record_request_time(elapsed);
                Err(self.fail(FailureReason::Source(e)))
            }
        }
    }

    /// Writes `data` to `tile` at this layer's priority.
    pub fn render(self: &Arc<Self>, data: &S::Data, tile: &RenderedTile) -> Result<bool, LayerError> {
        let started = Instant::now();
        let result = data.apply(tile, self.settings.priority());
        self.stats.record_render_time(started.elapsed());
        result.map_err(|e| self.fail(FailureReason::Render(e)))
    }

    /// Returns the permit once the rate window for this fetch has passed.
    ///
    /// With `n` permits and a cap of `r` requests per second, each permit
    /// is held for at least `n / r` seconds.
    fn release(&self, permit: OwnedSemaphorePermit, elapsed: Duration) {
        if !self.settings.is_rate_limited() {
            return;
        }
        let window = Duration::try_from_secs_f64(
            self.settings.max_parallel_requests() as f64 / self.settings.requests_per_second(),
        )
        .unwrap_or(Duration::MAX);
        let remaining = window.saturating_sub(elapsed);
        if remaining.is_zero() {
            return;
        }
        tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            drop(permit);
        });
    }

    fn fail(self: &Arc<Self>, reason: FailureReason) -> LayerError {
        let channel = <S::Data as Renderable>::CHANNEL;
        self.stats.record_failure();
        warn!(
            layer = %self.settings.name(),
            %channel,
            error = %reason,
            "Layer failed, deactivating"
        );
        self.set_active(false);
        let handle: Arc<dyn LayerHandle> = Arc::clone(self) as Arc<dyn LayerHandle>;
        LayerError::Failed(LayerFailure::new(handle, channel, reason))
    }
}

impl<S: LayerSource> LayerHandle for DataLayer<S> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    fn channel(&self) -> Channel {
        <S::Data as Renderable>::CHANNEL
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn set_active(&self, active: bool) {
        if self.active.swap(active, Ordering::AcqRel) == active {
            return;
        }
        info!(layer = %self.settings.name(), active, "Layer activity changed");
        self.active_observers.notify(&active);
    }

    fn on_active_changed(&self, observer: Box<dyn Fn(bool) + Send + Sync>) -> SubscriptionId {
        self.active_observers.subscribe(move |active: &bool| observer(*active))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.active_observers.unsubscribe(id)
    }

    fn statistics(&self) -> LayerStatistics {
        self.stats.snapshot()
    }

    fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }
}

impl<S: LayerSource> Layer<S::Data> for DataLayer<S> {
    fn fetch(
        self: Arc<Self>,
        tile: TileAddress,
        area: BoundedArea,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<S::Data, LayerError>> {
        Box::pin(async move { self.request(tile, &area, &cancel).await })
    }

    fn apply(self: Arc<Self>, data: &S::Data, tile: &RenderedTile) -> Result<bool, LayerError> {
        self.render(data, tile)
    }

    fn as_handle(self: Arc<Self>) -> Arc<dyn LayerHandle> {
        self
    }
}

impl<S: LayerSource> std::fmt::Debug for DataLayer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLayer")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("active", &self.is_active())
            .finish()
    }
}
