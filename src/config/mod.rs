// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] maps `Assetpipe.toml` onto serde structs and owns the
//!   built-in source/output layout defaults.
//! - [`loader`] reads and deserializes the file (a missing file falls back
//!   to defaults).
//! - [`validate`] checks semantic invariants: known categories, valid and
//!   acyclic `after` references, sane path roots.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{CategoryPaths, ConfigFile, CategoryOverride, PathsSection, RawConfigFile, WatchSection};
