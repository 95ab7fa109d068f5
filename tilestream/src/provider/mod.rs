//! Layer data providers.
//!
//! Sources implement [`LayerSource`](crate::layer::LayerSource) and are
//! wrapped in a [`DataLayer`](crate::layer::DataLayer) for caching and
//! throttling:
//!
//! - [`UrlTemplateTextureSource`]: imagery over HTTP
//! - [`TerrainRgbMeshSource`]: terrain-RGB elevation over HTTP
//! - [`SolidColorTextureSource`] / [`FlatMeshSource`]: offline base layers

mod base;
pub(crate) mod http;
mod template;
mod terrain;
mod texture;

pub use base::{FlatMeshSource, SolidColorTextureSource};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_TIMEOUT};
pub use template::UrlTemplate;
pub use terrain::{
    decode_height, sample_elevation, Interpolation, TerrainRgbMeshSource, MAX_MESH_RESOLUTION,
    MIN_MESH_RESOLUTION,
};
pub use texture::UrlTemplateTextureSource;
