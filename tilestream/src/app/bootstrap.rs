//! Application bootstrap implementation.
//!
//! Turns a parsed [`ConfigFile`](crate::config::ConfigFile) into running
//! layer collections and an [`UpdateOrchestrator`]. Layers that cannot be
//! built are reported next to the ones the parser already rejected; only a
//! broken base layer stops startup.

use std::sync::Arc;

use glam::DVec3;
use tracing::{info, warn};

use super::config::AppConfig;
use super::error::AppError;
use crate::config::{LayerConfig, LayerKind, RejectedLayer};
use crate::coord::{GeoPoint, LocalProjection};
use crate::layer::{
    DataLayer, Layer, LayerCollection, LayerHandle, LayerSettings, LayerStatistics,
    BASE_LAYER_PRIORITY,
};
use crate::orchestrator::UpdateOrchestrator;
use crate::provider::{
    AsyncReqwestClient, FlatMeshSource, SolidColorTextureSource, TerrainRgbMeshSource,
    UrlTemplateTextureSource,
};
use crate::render::{HeightMesh, RenderHost, Texture};
use crate::segmentation::Viewpoint;
use crate::telemetry::TelemetrySnapshot;

/// Statistics of one layer, for display.
#[derive(Clone, Debug)]
pub struct LayerReport {
    pub name: String,
    pub channel: crate::render::Channel,
    pub priority: i32,
    pub active: bool,
    pub current: bool,
    pub statistics: LayerStatistics,
}

/// A configured tile stream.
///
/// # Example
///
/// ```ignore
/// use tilestream::app::{AppConfig, TileStreamApp};
///
/// let app = TileStreamApp::start(config, host)?;
/// let viewpoint = app.viewpoint(&position, heading, -30.0);
/// app.orchestrator().update(viewpoint).await;
/// ```
pub struct TileStreamApp {
    orchestrator: Arc<UpdateOrchestrator>,
    rejected: Vec<RejectedLayer>,
    config: AppConfig,
}

impl TileStreamApp {
    /// Builds every layer and the orchestrator. Must be called inside a
    /// Tokio runtime.
    pub fn start(config: AppConfig, host: Arc<dyn RenderHost>) -> Result<Self, AppError> {
        let stream = &config.file.stream;
        let client =
            AsyncReqwestClient::with_timeout(stream.http_timeout).map_err(AppError::HttpClient)?;

        let base_texture: Arc<dyn Layer<Texture>> = Arc::new(
            DataLayer::new(
                LayerSettings::new("base-imagery", BASE_LAYER_PRIORITY).with_cache_capacity(0),
                SolidColorTextureSource::new(config.base_color),
            )
            .map_err(AppError::BaseLayer)?,
        );
        let base_mesh: Arc<dyn Layer<HeightMesh>> = Arc::new(
            DataLayer::new(
                LayerSettings::new("base-elevation", BASE_LAYER_PRIORITY).with_cache_capacity(0),
                FlatMeshSource::new(config.base_mesh_resolution),
            )
            .map_err(AppError::BaseLayer)?,
        );
        let textures = LayerCollection::new(base_texture);
        let meshes = LayerCollection::new(base_mesh);

        let mut rejected = config.file.rejected.clone();
        for layer in &config.file.layers {
            match build_layer(layer, &client) {
                Ok(Built::Texture(l)) => textures.add(l)?,
                Ok(Built::Mesh(l)) => meshes.add(l)?,
                Err(error) => {
                    warn!(layer = layer.name(), %error, "Layer excluded");
                    rejected.push(RejectedLayer {
                        name: layer.name().to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            textures = textures.layers().len(),
            meshes = meshes.layers().len(),
            rejected = rejected.len(),
            texture_layer = %textures.current().name(),
            mesh_layer = %meshes.current().name(),
            "Tile stream started"
        );

        let orchestrator = UpdateOrchestrator::new(
            stream.orchestrator_config(),
            LocalProjection::new(config.origin),
            host,
            textures,
            meshes,
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            rejected,
            config,
        })
    }

    pub fn orchestrator(&self) -> &Arc<UpdateOrchestrator> {
        &self.orchestrator
    }

    /// Layers left out at startup, in file order.
    pub fn rejected(&self) -> &[RejectedLayer] {
        &self.rejected
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Viewpoint at `position` looking along `heading_deg` (clockwise from
    /// north), tilted by `pitch_deg` (negative looks down).
    pub fn viewpoint(&self, position: &GeoPoint, heading_deg: f64, pitch_deg: f64) -> Viewpoint {
        let local = self.orchestrator.projection().to_local(position);
        let (heading, pitch) = (heading_deg.to_radians(), pitch_deg.to_radians());
        let forward = DVec3::new(
            pitch.cos() * heading.sin(),
            pitch.sin(),
            pitch.cos() * heading.cos(),
        );
        Viewpoint::new(local, forward)
    }

    /// One report per layer: imagery first, then elevation, base layers
    /// first within each channel.
    pub fn layer_reports(&self) -> Vec<LayerReport> {
        let textures = self.orchestrator.textures();
        let meshes = self.orchestrator.meshes();
        let current = [textures.current().id(), meshes.current().id()];

        let handles = textures
            .layers()
            .into_iter()
            .map(|l| l.as_handle())
            .chain(meshes.layers().into_iter().map(|l| l.as_handle()));
        handles
            .map(|layer| LayerReport {
                name: layer.name().to_string(),
                channel: layer.channel(),
                priority: layer.priority(),
                active: layer.is_active(),
                current: current.contains(&layer.id()),
                statistics: layer.statistics(),
            })
            .collect()
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.orchestrator.metrics().snapshot()
    }

    /// Cancels outstanding requests and removes every tile.
    pub fn shutdown(&self) {
        info!("Shutting down tile stream");
        self.orchestrator.clear();
    }
}

enum Built {
    Texture(Arc<dyn Layer<Texture>>),
    Mesh(Arc<dyn Layer<HeightMesh>>),
}

fn build_layer(
    layer: &LayerConfig,
    client: &AsyncReqwestClient,
) -> Result<Built, crate::layer::SettingsError> {
    let settings = layer.settings.clone();
    match layer.kind {
        LayerKind::Texture => {
            let source = UrlTemplateTextureSource::new(layer.template.clone(), client.clone());
            Ok(Built::Texture(Arc::new(DataLayer::new(settings, source)?)))
        }
        LayerKind::Mesh {
            resolution,
            interpolation,
        } => {
            let source = TerrainRgbMeshSource::new(
                layer.name(),
                layer.template.clone(),
                client.clone(),
                resolution,
                interpolation,
            )?;
            Ok(Built::Mesh(Arc::new(DataLayer::new(settings, source)?)))
        }
    }
}
