//! Object-safe layer interfaces.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::area::BoundedArea;
use crate::events::SubscriptionId;
use crate::render::{Channel, RenderedTile};
use crate::tile::TileAddress;

use super::{BoxFuture, LayerError, LayerSettings, LayerStatistics};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique layer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(u64);

impl LayerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Data-type independent view of a layer.
pub trait LayerHandle: Send + Sync {
    fn id(&self) -> LayerId;

    fn settings(&self) -> &LayerSettings;

    fn name(&self) -> &str {
        self.settings().name()
    }

    fn priority(&self) -> i32 {
        self.settings().priority()
    }

    /// The tile channel this layer fills.
    fn channel(&self) -> Channel;

    fn is_active(&self) -> bool;

    /// Observers are only notified on an actual change.
    fn set_active(&self, active: bool);

    fn on_active_changed(&self, observer: Box<dyn Fn(bool) + Send + Sync>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    fn statistics(&self) -> LayerStatistics;

    fn clear_cache(&self);
}

impl fmt::Debug for dyn LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("priority", &self.priority())
            .field("channel", &self.channel())
            .field("active", &self.is_active())
            .finish()
    }
}

/// A layer producing data of type `D`.
pub trait Layer<D>: LayerHandle {
    /// Fetches the data for `tile`, covering `area`.
    ///
    /// Resolves to [`LayerError::Cancelled`] once `cancel` fires, and to
    /// [`LayerError::Failed`] after deactivating the layer on error.
    fn fetch(
        self: Arc<Self>,
        tile: TileAddress,
        area: BoundedArea,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<D, LayerError>>;

    /// Writes `data` to `tile` at this layer's priority.
    fn apply(self: Arc<Self>, data: &D, tile: &RenderedTile) -> Result<bool, LayerError>;

    fn as_handle(self: Arc<Self>) -> Arc<dyn LayerHandle>;
}
