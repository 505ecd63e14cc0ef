// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transform error in {path}: {reason}")]
    Transform { path: PathBuf, reason: String },

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Cycle detected in task graph: {0}")]
    GraphCycle(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Build a `Transform` error for a given source file.
    pub fn transform(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::Transform {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
