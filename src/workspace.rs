// src/workspace.rs

//! Workspace initialization: phase 1 of a full run.
//!
//! Resets the output root to an empty directory and, when the source root
//! does not exist yet, scaffolds the conventional source layout so a fresh
//! project can run the full pipeline immediately.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::ConfigFile;
use crate::errors::Result;

/// Placeholder page written when scaffolding a fresh source tree.
const PLACEHOLDER_INDEX: &str = "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  <title>assetpipe project</title>\n</head>\n<body>\n  <h1>It works</h1>\n</body>\n</html>\n";

/// Source subdirectories created during scaffolding, matching the built-in
/// category patterns.
const SOURCE_DIRS: &[&str] = &["scss", "js", "img", "fonts", "parts"];

/// Prepare the workspace for a full pipeline run.
///
/// Idempotent: an already-initialized workspace just gets its output root
/// emptied again. Failure here is fatal to the run.
pub fn initialize(cfg: &ConfigFile) -> Result<()> {
    clean_output(cfg)?;

    if !cfg.source_root().exists() {
        scaffold_sources(cfg.source_root())?;
    }

    Ok(())
}

/// Recreate the output root as an empty directory.
pub fn clean_output(cfg: &ConfigFile) -> Result<()> {
    let out = cfg.output_root();

    match fs::remove_dir_all(out) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(out)?;

    info!(output = %out.display(), "output root reset");
    Ok(())
}

fn scaffold_sources(root: &Path) -> Result<()> {
    for dir in SOURCE_DIRS {
        fs::create_dir_all(root.join(dir))?;
    }
    fs::write(root.join("index.html"), PLACEHOLDER_INDEX)?;

    info!(source = %root.display(), "scaffolded fresh source tree");
    Ok(())
}
