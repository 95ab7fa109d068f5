//! In-flight work for one tile address.
//!
//! A [`TileRequest`] owns one cancellation token and two [`ChannelTask`]s,
//! one per render channel. Each task fetches from a layer, renders the
//! result onto the tile and publishes its [`TaskState`] on a watch channel.
//! Restarting a task bumps its generation so late results from the previous
//! run are discarded.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::layer::{Layer, LayerError, LayerFailure, LayerHandle, Renderable};
use crate::render::{Channel, HeightMesh, RenderedTile, Texture};

use super::TileAddress;

/// Called after data was accepted by a tile.
pub type AppliedHook = Arc<dyn Fn(TileAddress, Channel) + Send + Sync>;

/// Lifecycle of one channel task.
#[derive(Debug, Clone)]
pub enum TaskState {
    /// Never started.
    Idle,
    Pending,
    Completed,
    Cancelled,
    Failed(LayerFailure),
}

impl TaskState {
    /// The task has finished, one way or another.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Idle | Self::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn failure(&self) -> Option<&LayerFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    state: TaskState,
}

/// Fetch-then-render task for one channel of one tile.
#[derive(Debug)]
pub struct ChannelTask {
    channel: Channel,
    slot: Arc<watch::Sender<Slot>>,
}

impl ChannelTask {
    pub fn new(channel: Channel) -> Self {
        let (slot, _) = watch::channel(Slot {
            generation: 0,
            state: TaskState::Idle,
        });
        Self {
            channel,
            slot: Arc::new(slot),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> TaskState {
        self.slot.borrow().state.clone()
    }

    /// Spawns a fetch from `layer` for `tile`, superseding any earlier run.
    pub fn start<D: Renderable>(
        &self,
        layer: Arc<dyn Layer<D>>,
        tile: Arc<RenderedTile>,
        cancel: CancellationToken,
        on_applied: Option<AppliedHook>,
    ) {
        let mut generation = 0;
        self.slot.send_modify(|slot| {
            slot.generation += 1;
            slot.state = TaskState::Pending;
            generation = slot.generation;
        });

        let slot = Arc::clone(&self.slot);
        let channel = self.channel;
        let address = tile.address();
        trace!(tile = %address, %channel, layer = %layer.name(), "Channel task started");

        tokio::spawn(async move {
            let fetched = Arc::clone(&layer)
                .fetch(address, address.area(), cancel.clone())
                .await;

            let state = match fetched {
                Ok(_) if cancel.is_cancelled() => TaskState::Cancelled,
                Ok(data) => match layer.apply(&data, &tile) {
                    Ok(applied) => {
                        if applied {
                            if let Some(hook) = &on_applied {
                                hook(address, channel);
                            }
                        }
                        TaskState::Completed
                    }
                    Err(e) => state_for(e),
                },
                Err(e) => state_for(e),
            };

            slot.send_if_modified(|slot| {
                if slot.generation != generation {
                    return false;
                }
                slot.state = state;
                true
            });
        });
    }

    /// Resolves once the task settles. A task whose owner went away counts
    /// as cancelled.
    pub fn completion(&self) -> impl Future<Output = TaskState> + Send + 'static {
        let mut rx = self.slot.subscribe();
        async move {
            match rx.wait_for(|slot| slot.state.is_settled()).await {
                Ok(slot) => slot.state.clone(),
                Err(_) => TaskState::Cancelled,
            }
        }
    }
}

fn state_for(error: LayerError) -> TaskState {
    match error {
        LayerError::Cancelled => TaskState::Cancelled,
        LayerError::Failed(failure) => TaskState::Failed(failure),
    }
}

/// Texture and mesh work for one tile address, sharing one cancellation
/// token.
#[derive(Debug)]
pub struct TileRequest {
    address: TileAddress,
    cancel: CancellationToken,
    texture: ChannelTask,
    mesh: ChannelTask,
}

impl TileRequest {
    pub fn new(address: TileAddress) -> Self {
        Self {
            address,
            cancel: CancellationToken::new(),
            texture: ChannelTask::new(Channel::Texture),
            mesh: ChannelTask::new(Channel::Mesh),
        }
    }

    pub fn address(&self) -> TileAddress {
        self.address
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn texture(&self) -> &ChannelTask {
        &self.texture
    }

    pub fn mesh(&self) -> &ChannelTask {
        &self.mesh
    }

    /// Both channels completed.
    pub fn is_complete(&self) -> bool {
        self.texture.state().is_completed() && self.mesh.state().is_completed()
    }

    /// Starts every channel that is idle or ended without data, using the
    /// given layers. Does nothing once the request is cancelled.
    ///
    /// Returns the channels that are now running.
    pub fn ensure_started(
        &self,
        texture_layer: &Arc<dyn Layer<Texture>>,
        mesh_layer: &Arc<dyn Layer<HeightMesh>>,
        tile: &Arc<RenderedTile>,
        on_applied: Option<&AppliedHook>,
    ) -> Vec<Channel> {
        if self.is_cancelled() {
            return Vec::new();
        }
        let mut started = Vec::new();
        if needs_start(&self.texture.state()) {
            self.texture.start(
                Arc::clone(texture_layer),
                Arc::clone(tile),
                self.token(),
                on_applied.cloned(),
            );
            started.push(Channel::Texture);
        }
        if needs_start(&self.mesh.state()) {
            self.mesh.start(
                Arc::clone(mesh_layer),
                Arc::clone(tile),
                self.token(),
                on_applied.cloned(),
            );
            started.push(Channel::Mesh);
        }
        started
    }

    /// Completion futures for the channels that have not completed yet.
    pub fn pending(&self) -> Vec<ChannelCompletion> {
        [&self.texture, &self.mesh]
            .into_iter()
            .filter(|task| !task.state().is_completed())
            .map(|task| ChannelCompletion {
                tile: self.address,
                channel: task.channel(),
                done: Box::pin(task.completion()),
            })
            .collect()
    }
}

fn needs_start(state: &TaskState) -> bool {
    matches!(
        state,
        TaskState::Idle | TaskState::Cancelled | TaskState::Failed(_)
    )
}

/// Future resolving to `(tile, channel, state)` once a channel settles.
pub struct ChannelCompletion {
    tile: TileAddress,
    channel: Channel,
    done: std::pin::Pin<Box<dyn Future<Output = TaskState> + Send>>,
}

impl Future for ChannelCompletion {
    type Output = (TileAddress, Channel, TaskState);

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let (tile, channel) = (self.tile, self.channel);
        self.done
            .as_mut()
            .poll(cx)
            .map(|state| (tile, channel, state))
    }
}
