//! Orchestrator types

use std::fmt;

use crate::layer::LayerFailure;
use crate::render::Channel;
use crate::tile::TileAddress;

/// How an update cycle ended.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The viewpoint did not move enough and nothing was pending.
    Skipped,
    /// A newer cycle started before this one reconciled.
    Preempted,
    Completed,
    /// Reconciled after a layer failed; the next cycle retries with the
    /// next layer in line.
    CompletedWithFailure(LayerFailure),
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithFailure(_))
    }

    pub fn is_preempted(&self) -> bool {
        matches!(self, Self::Preempted)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Preempted => write!(f, "preempted"),
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithFailure(failure) => write!(f, "completed with failure: {}", failure),
        }
    }
}

/// Tile stream notifications for the host.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TileAdded(TileAddress),
    /// Sent after the tile's target was destroyed.
    TileRemoved(TileAddress),
    /// A channel of the tile accepted new data.
    TileUpdated { tile: TileAddress, channel: Channel },
    LayerFailed(LayerFailure),
}
