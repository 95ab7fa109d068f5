//! Layer error types.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::render::{Channel, RenderError};

use super::{LayerHandle, LayerId};

/// Errors produced by a [`LayerSource`](super::LayerSource) fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

/// Why a layer gave up on a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("fetch failed: {0}")]
    Source(#[from] SourceError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}

/// A layer failure, carrying the layer that failed so the caller can fall
/// back to another one.
#[derive(Clone)]
pub struct LayerFailure {
    layer: Arc<dyn LayerHandle>,
    channel: Channel,
    reason: FailureReason,
}

impl LayerFailure {
    pub fn new(layer: Arc<dyn LayerHandle>, channel: Channel, reason: FailureReason) -> Self {
        Self {
            layer,
            channel,
            reason,
        }
    }

    pub fn layer(&self) -> &Arc<dyn LayerHandle> {
        &self.layer
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer.id()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn reason(&self) -> &FailureReason {
        &self.reason
    }
}

impl fmt::Display for LayerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Layer '{}' ({}) failed: {}",
            self.layer.name(),
            self.channel,
            self.reason
        )
    }
}

impl fmt::Debug for LayerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerFailure")
            .field("layer", &self.layer.name())
            .field("id", &self.layer.id())
            .field("channel", &self.channel)
            .field("reason", &self.reason)
            .finish()
    }
}

impl std::error::Error for LayerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

/// Result of a layer request that did not produce data.
#[derive(Debug, Clone, Error)]
pub enum LayerError {
    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] LayerFailure),
}

impl LayerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn failure(&self) -> Option<&LayerFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Cancelled => None,
        }
    }
}

/// Errors from [`LayerCollection`](super::LayerCollection) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("The base layer cannot be removed")]
    BaseLayerRemoval,

    #[error("The base layer cannot be deactivated")]
    BaseLayerDeactivation,

    #[error("Layer {0} is already in the collection")]
    DuplicateLayer(LayerId),

    #[error("Layer {0} is not in the collection")]
    UnknownLayer(LayerId),
}
