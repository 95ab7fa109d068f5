//! Data layers.
//!
//! A layer turns a tile address into data for one channel of a rendered
//! tile. [`DataLayer`] wraps a [`LayerSource`] with a result cache, a
//! concurrency gate, an optional rate cap and cancellation. A
//! [`LayerCollection`] arbitrates between the layers of one channel by
//! priority, with a base layer as the fallback.

mod collection;
mod data_layer;
mod error;
mod handle;
mod settings;
mod source;
mod stats;

pub use collection::LayerCollection;
pub use data_layer::DataLayer;
pub use error::{CollectionError, FailureReason, LayerError, LayerFailure, SourceError};
pub use handle::{Layer, LayerHandle, LayerId};
pub use settings::{
    LayerSettings, SettingsError, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_PARALLEL_REQUESTS,
    DEFAULT_REQUESTS_PER_SECOND,
};
pub use source::{BoxFuture, LayerSource, Renderable};
pub use stats::{LayerStatistics, LATENCY_WINDOW};

/// Priority of base layers; any added layer outranks them.
pub const BASE_LAYER_PRIORITY: i32 = i32::MIN;
