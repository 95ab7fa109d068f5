//! CLI subcommands.

pub mod check;
pub mod fly;
mod host;

use std::path::PathBuf;

use tilestream::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Loads `path`, or the default config file when none is given.
pub fn load_config(path: Option<PathBuf>) -> Result<(PathBuf, ConfigFile), CliError> {
    let path = path.unwrap_or_else(config_file_path);
    let config = ConfigFile::load(&path)?;
    Ok((path, config))
}
