//! `tilestream check`: validate a configuration file.

use std::path::PathBuf;

use tilestream::config::{ConfigFile, LayerConfig, LayerKind};

use super::load_config;
use crate::error::CliError;

pub fn run(config: Option<PathBuf>) -> Result<(), CliError> {
    let (path, config) = load_config(config)?;
    println!("Configuration: {}", path.display());
    println!();
    print!("{}", render_report(&config));
    Ok(())
}

fn describe(layer: &LayerConfig) -> String {
    let kind = match &layer.kind {
        LayerKind::Texture => "texture".to_string(),
        LayerKind::Mesh {
            resolution,
            interpolation,
        } => format!("mesh {}x{} {}", resolution, resolution, interpolation),
    };
    let settings = &layer.settings;
    let rate = if settings.is_rate_limited() {
        format!("{}/s", settings.requests_per_second())
    } else {
        "unlimited".to_string()
    };
    format!(
        "  {:<16} {:<22} priority {:>4}  parallel {:>2}  rate {:<9}  {}",
        layer.name(),
        kind,
        settings.priority(),
        settings.max_parallel_requests(),
        rate,
        layer.template.as_str()
    )
}

/// Human-readable summary of `config`.
fn render_report(config: &ConfigFile) -> String {
    let stream = &config.stream;
    let mut out = String::new();
    out.push_str("Stream\n");
    out.push_str(&format!(
        "  zoom {}..={}  resolution {}  tiles {}..={}\n",
        stream.zoom_min, stream.zoom_max, stream.resolution, stream.tile_count_min, stream.tile_count_max
    ));
    out.push_str(&format!(
        "  area x{} (min {} m)  fade {} ms  culling {}\n",
        stream.size_multiplier,
        stream.min_size_m,
        stream.fade_duration.as_millis(),
        if stream.culling {
            format!("{} deg", stream.culling_angle)
        } else {
            "off".to_string()
        }
    ));
    out.push('\n');

    out.push_str(&format!("Accepted layers ({})\n", config.layers.len()));
    for layer in &config.layers {
        out.push_str(&describe(layer));
        out.push('\n');
    }
    out.push('\n');

    out.push_str(&format!("Rejected layers ({})\n", config.rejected.len()));
    for rejected in &config.rejected {
        out.push_str(&format!("  {:<16} {}\n", rejected.name, rejected.error));
    }
    out
}
