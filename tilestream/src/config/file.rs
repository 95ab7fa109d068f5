//! Configuration file handling for ~/.tilestream/config.ini.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::{debug, info};

use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file does not exist
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read or tokenize the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid `[stream]` value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigFile {
    /// Loads `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Err(ConfigFileError::NotFound(path.to_path_buf()));
        }
        let ini = Ini::load_from_file(path)?;
        let config = super::parser::parse_ini(&ini)?;
        info!(
            path = %path.display(),
            layers = config.layers.len(),
            rejected = config.rejected.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Loads the default config file, falling back to defaults when it does
    /// not exist.
    pub fn load_default() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigFileError::ReadError(ini::Error::Parse(e)))?;
        super::parser::parse_ini(&ini)
    }
}

/// Get the path to the config directory (~/.tilestream).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilestream")
}

/// Get the path to the config file (~/.tilestream/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
