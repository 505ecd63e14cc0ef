// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (category names, dependency acyclicity). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML; a missing file falls back to the built-in defaults.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - unknown `[category.*]` keys,
///   - unknown or self-referencing `after` entries,
///   - dependency cycles,
///   - source root equal to (or inside) the output root.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();

    let raw = if path.exists() {
        load_from_path(path)?
    } else {
        debug!(?path, "config file not found; using built-in defaults");
        RawConfigFile::default()
    };

    let config = ConfigFile::try_from(raw)?;
    Ok(config)
}

/// Default config path: `Assetpipe.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Assetpipe.toml")
}
