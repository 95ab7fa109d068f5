//! Per-layer settings.

use thiserror::Error;

/// Parallel fetches allowed when a layer does not say otherwise.
pub const DEFAULT_MAX_PARALLEL_REQUESTS: usize = 4;

/// Rate cap when a layer does not say otherwise; `0` means unlimited.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 0.0;

/// Cached results per layer when a layer does not say otherwise.
pub const DEFAULT_CACHE_CAPACITY: u64 = 256;

/// Errors that exclude a layer at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("Layer name must not be empty")]
    EmptyName,

    #[error("Layer '{name}': max_parallel_requests must be at least 1")]
    ZeroParallelRequests { name: String },

    #[error("Layer '{name}': requests_per_second must be a number, got {rate}")]
    InvalidRate { name: String, rate: f64 },

    #[error("Layer '{name}': missing required field '{field}'")]
    MissingField { name: String, field: &'static str },

    #[error("Layer '{name}': invalid value '{value}' for '{field}'")]
    InvalidValue {
        name: String,
        field: &'static str,
        value: String,
    },

    #[error("Layer '{name}': URL template '{url}' must contain {{x}}, {{y}} and {{zoom}}, or {{quadkey}}")]
    MissingPlaceholder { name: String, url: String },

    #[error("Layer '{name}': URL template uses {{s}} but no servers are configured")]
    MissingServers { name: String },

    #[error("Layer '{name}': mesh resolution must be between 2 and 257, got {resolution}")]
    InvalidMeshResolution { name: String, resolution: usize },

    #[error("Layer '{name}': unknown interpolation '{value}' (expected nearest or bilinear)")]
    UnknownInterpolation { name: String, value: String },

    #[error("Layer '{name}': unknown kind '{value}' (expected texture or mesh)")]
    UnknownKind { name: String, value: String },
}

/// Immutable settings shared by every layer kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSettings {
    name: String,
    priority: i32,
    max_parallel_requests: usize,
    requests_per_second: f64,
    cache_capacity: u64,
}

impl LayerSettings {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            max_parallel_requests: DEFAULT_MAX_PARALLEL_REQUESTS,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_max_parallel_requests(mut self, permits: usize) -> Self {
        self.max_parallel_requests = permits;
        self
    }

    /// Values `<= 0` disable rate limiting.
    pub fn with_requests_per_second(mut self, rate: f64) -> Self {
        self.requests_per_second = rate;
        self
    }

    /// `0` disables caching.
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.name.trim().is_empty() {
            return Err(SettingsError::EmptyName);
        }
        if self.max_parallel_requests == 0 {
            return Err(SettingsError::ZeroParallelRequests {
                name: self.name.clone(),
            });
        }
        if self.requests_per_second.is_nan() {
            return Err(SettingsError::InvalidRate {
                name: self.name.clone(),
                rate: self.requests_per_second,
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn max_parallel_requests(&self) -> usize {
        self.max_parallel_requests
    }

    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    pub fn is_rate_limited(&self) -> bool {
        self.requests_per_second > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LayerSettings::new("osm", 10);
        assert_eq!(settings.max_parallel_requests(), DEFAULT_MAX_PARALLEL_REQUESTS);
        assert_eq!(settings.cache_capacity(), DEFAULT_CACHE_CAPACITY);
        assert!(!settings.is_rate_limited());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            LayerSettings::new("  ", 0).validate(),
            Err(SettingsError::EmptyName)
        );
        assert!(matches!(
            LayerSettings::new("a", 0)
                .with_max_parallel_requests(0)
                .validate(),
            Err(SettingsError::ZeroParallelRequests { .. })
        ));
        assert!(matches!(
            LayerSettings::new("a", 0)
                .with_requests_per_second(f64::NAN)
                .validate(),
            Err(SettingsError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_negative_rate_is_unlimited() {
        let settings = LayerSettings::new("a", 0).with_requests_per_second(-1.0);
        assert!(settings.validate().is_ok());
        assert!(!settings.is_rate_limited());
    }

    #[test]
    fn test_placeholder_error_message() {
        let err = SettingsError::MissingPlaceholder {
            name: "osm".into(),
            url: "http://x".into(),
        };
        assert!(err.to_string().contains("{x}"));
    }
}
