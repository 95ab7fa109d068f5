//! TileStream - Viewpoint-driven streaming of imagery and terrain tiles
//!
//! This library decides which Web Mercator tiles a viewer needs, fetches
//! imagery and elevation for them from prioritized layers and drives a host
//! renderer through fade-in, draw-order and fade-out transitions.
//!
//! ```text
//! Viewpoint ─► segmentation ─► orchestrator ─► layer collections ─► sources
//!                                   │
//!                                   ▼
//!                           render (RenderedTile) ─► RenderHost
//! ```

pub mod app;
pub mod area;
pub mod config;
pub mod coord;
pub mod events;
pub mod layer;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod render;
pub mod segmentation;
pub mod telemetry;
pub mod tile;

pub use app::{AppConfig, AppError, TileStreamApp};
pub use orchestrator::{CycleOutcome, StreamEvent, UpdateOrchestrator};
