//! Application error types.

use std::fmt;

use crate::config::ConfigFileError;
use crate::layer::{CollectionError, SettingsError, SourceError};

/// Errors that can occur while bootstrapping the stream.
#[derive(Debug)]
pub enum AppError {
    /// Failed to load the configuration file.
    Config(ConfigFileError),

    /// Failed to create the shared HTTP client.
    HttpClient(SourceError),

    /// A base layer could not be created.
    BaseLayer(SettingsError),

    /// A layer could not be registered.
    Collection(CollectionError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            AppError::BaseLayer(e) => write!(f, "Failed to create base layer: {}", e),
            AppError::Collection(e) => write!(f, "Failed to register layer: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::HttpClient(e) => Some(e),
            AppError::BaseLayer(e) => Some(e),
            AppError::Collection(e) => Some(e),
        }
    }
}

impl From<ConfigFileError> for AppError {
    fn from(e: ConfigFileError) -> Self {
        AppError::Config(e)
    }
}

impl From<CollectionError> for AppError {
    fn from(e: CollectionError) -> Self {
        AppError::Collection(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::path::PathBuf;

    #[test]
    fn test_app_error_display() {
        let err = AppError::BaseLayer(SettingsError::EmptyName);
        assert!(err.to_string().contains("base layer"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_app_error_from_config_error() {
        let app_err: AppError = ConfigFileError::NotFound(PathBuf::from("x.ini")).into();
        assert!(matches!(app_err, AppError::Config(_)));
        assert!(app_err.to_string().contains("x.ini"));
    }
}
