//! Application bootstrap.
//!
//! [`TileStreamApp`] wires a parsed configuration into a running stream:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      TileStreamApp                        │
//! │                                                           │
//! │  ConfigFile ──► DataLayers ──► LayerCollection<Texture>   │
//! │                           └──► LayerCollection<HeightMesh>│
//! │                                        │                  │
//! │  RenderHost ─────────────────► UpdateOrchestrator         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every collection gets an always-available base layer, so a stream can
//! start with no configured layers at all.

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{LayerReport, TileStreamApp};
pub use config::{AppConfig, DEFAULT_BASE_COLOR, DEFAULT_BASE_MESH_RESOLUTION};
pub use error::AppError;
