//! Application configuration for TileStreamApp.

use crate::config::ConfigFile;
use crate::coord::GeoPoint;

/// Colour of the base imagery layer.
pub const DEFAULT_BASE_COLOR: [u8; 4] = [128, 128, 128, 255];

/// Vertices per side of the base elevation layer.
pub const DEFAULT_BASE_MESH_RESOLUTION: usize = 2;

/// Everything needed to start a [`TileStreamApp`](super::TileStreamApp).
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Parsed configuration file.
    pub file: ConfigFile,

    /// Origin of the local frame viewpoints are expressed in.
    pub origin: GeoPoint,

    pub base_color: [u8; 4],

    pub base_mesh_resolution: usize,
}

impl AppConfig {
    pub fn new(file: ConfigFile, origin: GeoPoint) -> Self {
        Self {
            file,
            origin,
            base_color: DEFAULT_BASE_COLOR,
            base_mesh_resolution: DEFAULT_BASE_MESH_RESOLUTION,
        }
    }
}
