//! Typed contents of the configuration file.

use std::time::Duration;

use crate::layer::{LayerSettings, SettingsError};
use crate::orchestrator::OrchestratorConfig;
use crate::provider::{Interpolation, UrlTemplate};
use crate::segmentation::{CullingConfig, SegmentationConfig};

use super::defaults::*;

/// `[stream]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub size_multiplier: f64,
    pub min_size_m: f64,
    pub zoom_min: u8,
    pub zoom_max: u8,
    pub resolution: f64,
    pub tile_count_min: usize,
    pub tile_count_max: usize,
    pub culling: bool,
    pub culling_angle: f64,
    pub fade_duration: Duration,
    pub movement_epsilon_m: f64,
    pub refine_inside_area_only: bool,
    pub http_timeout: Duration,
}

impl StreamSettings {
    pub fn segmentation_config(&self) -> SegmentationConfig {
        SegmentationConfig {
            target_tile_count: self.tile_count_min..=self.tile_count_max,
            zoom_min: self.zoom_min,
            zoom_max: self.zoom_max,
            resolution: self.resolution,
            culling: self.culling.then(|| CullingConfig::new(self.culling_angle)),
            refine_inside_area_only: self.refine_inside_area_only,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            segmentation: self.segmentation_config(),
            size_multiplier: self.size_multiplier,
            min_size_m: self.min_size_m,
            movement_epsilon_m: self.movement_epsilon_m,
            fade_duration: self.fade_duration,
            ..OrchestratorConfig::default()
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            size_multiplier: DEFAULT_STREAM_SIZE_MULTIPLIER,
            min_size_m: DEFAULT_STREAM_MIN_SIZE_M,
            zoom_min: DEFAULT_ZOOM_MIN,
            zoom_max: DEFAULT_ZOOM_MAX,
            resolution: DEFAULT_RESOLUTION,
            tile_count_min: DEFAULT_TILE_COUNT_MIN,
            tile_count_max: DEFAULT_TILE_COUNT_MAX,
            culling: DEFAULT_CULLING,
            culling_angle: DEFAULT_CULLING_ANGLE,
            fade_duration: DEFAULT_STREAM_FADE_DURATION,
            movement_epsilon_m: DEFAULT_STREAM_MOVEMENT_EPSILON_M,
            refine_inside_area_only: DEFAULT_REFINE_INSIDE_AREA_ONLY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Data a configured layer produces.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Texture,
    Mesh {
        resolution: usize,
        interpolation: Interpolation,
    },
}

/// A validated `[layer.<name>]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    pub settings: LayerSettings,
    pub kind: LayerKind,
    pub template: UrlTemplate,
}

impl LayerConfig {
    pub fn name(&self) -> &str {
        self.settings.name()
    }

    pub fn is_texture(&self) -> bool {
        matches!(self.kind, LayerKind::Texture)
    }
}

/// A layer section that failed validation and was left out.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedLayer {
    pub name: String,
    pub error: SettingsError,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub stream: StreamSettings,
    /// Accepted layers in file order.
    pub layers: Vec<LayerConfig>,
    pub rejected: Vec<RejectedLayer>,
}

impl ConfigFile {
    pub fn texture_layers(&self) -> impl Iterator<Item = &LayerConfig> {
        self.layers.iter().filter(|layer| layer.is_texture())
    }

    pub fn mesh_layers(&self) -> impl Iterator<Item = &LayerConfig> {
        self.layers.iter().filter(|layer| !layer.is_texture())
    }
}
