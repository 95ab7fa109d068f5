//! Configuration file loading.
//!
//! ```ini
//! [stream]
//! zoom_max = 19
//! fade_duration_ms = 300
//!
//! [layer.osm]
//! kind = texture
//! url = https://tile.openstreetmap.org/{zoom}/{x}/{y}.png
//! priority = 10
//! requests_per_second = 8
//! ```
//!
//! Defaults live in [`defaults`], parsing in `parser`, the typed result in
//! [`ConfigFile`].

pub mod defaults;
mod file;
mod parser;
mod settings;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LayerConfig, LayerKind, RejectedLayer, StreamSettings};
