//! INI parsing: the single place where key names map to struct fields.
//!
//! Errors in `[stream]` are fatal. Errors in a `[layer.<name>]` section only
//! reject that layer.

use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use tracing::warn;

use crate::coord::MAX_ZOOM;
use crate::layer::{LayerSettings, SettingsError};
use crate::provider::{Interpolation, UrlTemplate, MAX_MESH_RESOLUTION, MIN_MESH_RESOLUTION};

use super::defaults::{DEFAULT_MESH_RESOLUTION, LAYER_SECTION_PREFIX};
use super::file::ConfigFileError;
use super::settings::{ConfigFile, LayerConfig, LayerKind, RejectedLayer, StreamSettings};

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("stream")) {
        config.stream = parse_stream(section)?;
    }

    for (name, section) in ini.iter() {
        let Some(layer_name) = name.and_then(|n| n.strip_prefix(LAYER_SECTION_PREFIX)) else {
            continue;
        };
        match parse_layer(layer_name.trim(), section) {
            Ok(layer) => config.layers.push(layer),
            Err(error) => {
                warn!(layer = layer_name, %error, "Layer excluded");
                config.rejected.push(RejectedLayer {
                    name: layer_name.to_string(),
                    error,
                });
            }
        }
    }

    Ok(config)
}

/// Value of `key` with any trailing ` ; comment` or ` # comment` removed.
fn value<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    let raw = section.get(key)?;
    let cut = [" ;", "\t;", " #", "\t#"]
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min()
        .unwrap_or(raw.len());
    let v = raw[..cut].trim();
    (!v.is_empty()).then_some(v)
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: "stream".to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn stream_value<T: FromStr>(
    section: &Properties,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match value(section, key) {
        Some(v) => v.parse().map(Some).map_err(|_| invalid(key, v, reason)),
        None => Ok(None),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn stream_bool(section: &Properties, key: &str) -> Result<Option<bool>, ConfigFileError> {
    match value(section, key) {
        Some(v) => parse_bool(v)
            .map(Some)
            .ok_or_else(|| invalid(key, v, "must be true or false")),
        None => Ok(None),
    }
}

fn positive(key: &str, v: f64) -> Result<f64, ConfigFileError> {
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(invalid(key, &v.to_string(), "must be a positive number"))
    }
}

fn parse_stream(section: &Properties) -> Result<StreamSettings, ConfigFileError> {
    let mut s = StreamSettings::default();
    const NUMBER: &str = "must be a number";
    const COUNT: &str = "must be a non-negative integer";

    if let Some(v) = stream_value(section, "size_multiplier", NUMBER)? {
        s.size_multiplier = positive("size_multiplier", v)?;
    }
    if let Some(v) = stream_value::<f64>(section, "min_size", NUMBER)? {
        s.min_size_m = positive("min_size", v)?;
    }
    if let Some(v) = stream_value(section, "zoom_min", COUNT)? {
        s.zoom_min = v;
    }
    if let Some(v) = stream_value(section, "zoom_max", COUNT)? {
        s.zoom_max = v;
    }
    if s.zoom_max > MAX_ZOOM || s.zoom_min > s.zoom_max {
        return Err(invalid(
            "zoom_max",
            &s.zoom_max.to_string(),
            &format!("zoom range must satisfy zoom_min <= zoom_max <= {}", MAX_ZOOM),
        ));
    }
    if let Some(v) = stream_value(section, "resolution", NUMBER)? {
        s.resolution = positive("resolution", v)?;
    }
    if let Some(v) = stream_value(section, "tile_count_min", COUNT)? {
        s.tile_count_min = v;
    }
    if let Some(v) = stream_value(section, "tile_count_max", COUNT)? {
        s.tile_count_max = v;
    }
    if s.tile_count_max == 0 || s.tile_count_min > s.tile_count_max {
        return Err(invalid(
            "tile_count_max",
            &s.tile_count_max.to_string(),
            "must be at least 1 and not below tile_count_min",
        ));
    }
    if let Some(v) = stream_bool(section, "culling")? {
        s.culling = v;
    }
    if let Some(v) = stream_value::<f64>(section, "culling_angle", NUMBER)? {
        if !(v > 0.0 && v <= 360.0) {
            return Err(invalid("culling_angle", &v.to_string(), "must be in (0, 360]"));
        }
        s.culling_angle = v;
    }
    if let Some(v) = stream_value(section, "fade_duration_ms", COUNT)? {
        s.fade_duration = Duration::from_millis(v);
    }
    if let Some(v) = stream_value::<f64>(section, "movement_epsilon", NUMBER)? {
        if !(v.is_finite() && v >= 0.0) {
            return Err(invalid("movement_epsilon", &v.to_string(), "must not be negative"));
        }
        s.movement_epsilon_m = v;
    }
    if let Some(v) = stream_bool(section, "refine_inside_area_only")? {
        s.refine_inside_area_only = v;
    }
    if let Some(v) = stream_value::<u64>(section, "http_timeout", COUNT)? {
        if v == 0 {
            return Err(invalid("http_timeout", "0", "must be at least 1 second"));
        }
        s.http_timeout = Duration::from_secs(v);
    }
    Ok(s)
}

fn layer_value<T: FromStr>(
    name: &str,
    section: &Properties,
    field: &'static str,
) -> Result<Option<T>, SettingsError> {
    match value(section, field) {
        Some(v) => v.parse().map(Some).map_err(|_| SettingsError::InvalidValue {
            name: name.to_string(),
            field,
            value: v.to_string(),
        }),
        None => Ok(None),
    }
}

fn parse_layer(name: &str, section: &Properties) -> Result<LayerConfig, SettingsError> {
    if name.is_empty() {
        return Err(SettingsError::EmptyName);
    }
    let url = value(section, "url").ok_or_else(|| SettingsError::MissingField {
        name: name.to_string(),
        field: "url",
    })?;
    let servers = value(section, "servers")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    let template = UrlTemplate::parse(name, url, servers)?;

    let priority = layer_value(name, section, "priority")?.ok_or_else(|| {
        SettingsError::MissingField {
            name: name.to_string(),
            field: "priority",
        }
    })?;
    let mut settings = LayerSettings::new(name, priority);
    if let Some(v) = layer_value(name, section, "max_parallel_requests")? {
        settings = settings.with_max_parallel_requests(v);
    }
    if let Some(v) = layer_value(name, section, "requests_per_second")? {
        settings = settings.with_requests_per_second(v);
    }
    if let Some(v) = layer_value(name, section, "cache_capacity")? {
        settings = settings.with_cache_capacity(v);
    }
    settings.validate()?;

    let kind = match value(section, "kind").map(str::to_ascii_lowercase).as_deref() {
        None | Some("texture") => LayerKind::Texture,
        Some("mesh") => {
            let resolution =
                layer_value(name, section, "mesh_resolution")?.unwrap_or(DEFAULT_MESH_RESOLUTION);
            if !(MIN_MESH_RESOLUTION..=MAX_MESH_RESOLUTION).contains(&resolution) {
                return Err(SettingsError::InvalidMeshResolution {
                    name: name.to_string(),
                    resolution,
                });
            }
            let interpolation = match value(section, "interpolation") {
                Some(v) => v
                    .parse::<Interpolation>()
                    .map_err(|value| SettingsError::UnknownInterpolation {
                        name: name.to_string(),
                        value,
                    })?,
                None => Interpolation::default(),
            };
            LayerKind::Mesh {
                resolution,
                interpolation,
            }
        }
        Some(other) => {
            return Err(SettingsError::UnknownKind {
                name: name.to_string(),
                value: other.to_string(),
            })
        }
    };

    Ok(LayerConfig {
        settings,
        kind,
        template,
    })
}
