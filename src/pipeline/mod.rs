// src/pipeline/mod.rs

//! Transform tasks: the per-category build pipelines.
//!
//! Each task reads the source files matching its category's glob patterns,
//! pushes every file through one or more *stages* (ordered lists of
//! [`Transform`] steps), and writes the results under the category's output
//! directory. The transformations themselves are delegated:
//!
//! - [`include`] resolves `@@include("...")` directives (html + js).
//! - [`html`] rewrites `<img>` tags to `<picture>` with a WebP source.
//! - [`styles`] compiles Sass (`grass`), adds WebP rules and minifies
//!   (`lightningcss`).
//! - [`scripts`] strips comments and blank lines from scripts.
//! - [`images`] converts rasters to WebP and re-encodes the originals
//!   (`image`).
//! - [`fonts`] repackages TTFs as WOFF and WOFF2 containers.

pub mod fonts;
pub mod html;
pub mod images;
pub mod include;
pub mod scripts;
pub mod styles;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::{PipelineError, Result};
use crate::serve::ReloadNotifier;
use crate::watch::patterns::{collect_matching_files, PatternSet};

/// The five asset categories, each backed by exactly one build task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Html,
    Css,
    Js,
    Img,
    Fonts,
}

impl AssetKind {
    pub const ALL: &[AssetKind] = &[
        AssetKind::Html,
        AssetKind::Css,
        AssetKind::Js,
        AssetKind::Img,
        AssetKind::Fonts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Html => "html",
            AssetKind::Css => "css",
            AssetKind::Js => "js",
            AssetKind::Img => "img",
            AssetKind::Fonts => "fonts",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(AssetKind::Html),
            "css" => Ok(AssetKind::Css),
            "js" => Ok(AssetKind::Js),
            "img" => Ok(AssetKind::Img),
            "fonts" => Ok(AssetKind::Fonts),
            other => Err(format!("unknown asset category: {other}")),
        }
    }
}

/// An in-memory file flowing through a pipeline stage.
///
/// `rel_path` is relative to the task's output directory; transforms may
/// rewrite it (e.g. `style.scss` → `style.css`).
#[derive(Debug, Clone)]
pub struct FileData {
    pub rel_path: PathBuf,
    pub contents: Vec<u8>,
}

impl FileData {
    pub fn new(rel_path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            rel_path: rel_path.into(),
            contents,
        }
    }

    /// Same file with the extension replaced.
    pub fn with_extension(&self, ext: &str, contents: Vec<u8>) -> Self {
        Self {
            rel_path: self.rel_path.with_extension(ext),
            contents,
        }
    }

    /// Contents as UTF-8, or a `Transform` error naming this file.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.contents)
            .map_err(|_| PipelineError::transform(&self.rel_path, "file is not valid UTF-8"))
    }
}

/// One opaque transformation step.
///
/// Implementations must be pure with respect to the output tree: they may
/// read sources (the include resolver does) but never write; the task owns
/// all writes. A step maps one input file to zero or more output files.
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>>;
}

/// A per-file failure recorded during a task run.
#[derive(Debug, Clone)]
pub struct TransformFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a single task run: everything written plus everything that
/// failed. A run is *clean* when nothing failed; only clean runs emit a
/// reload notification.
#[derive(Debug, Clone, Default)]
pub struct OutputManifest {
    pub written: Vec<PathBuf>,
    pub failures: Vec<TransformFailure>,
}

impl OutputManifest {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A named build task: source patterns in, output files out.
pub struct TransformTask {
    kind: AssetKind,
    source_root: PathBuf,
    output_dir: PathBuf,
    /// Leading source path component stripped when mapping a source file to
    /// its output location (e.g. `scss/` for the css task).
    base: PathBuf,
    patterns: PatternSet,
    /// Each stage re-reads the *original* sources; stages never see each
    /// other's outputs.
    stages: Vec<Vec<Box<dyn Transform>>>,
    /// Whether the output directory is cleared before writing. False only
    /// for html, which shares the output root.
    clear_output: bool,
}

impl fmt::Debug for TransformTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformTask")
            .field("kind", &self.kind)
            .field("output_dir", &self.output_dir)
            .field("stages", &self.stages.len())
            .finish_non_exhaustive()
    }
}

impl TransformTask {
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolve the source files for this task, in deterministic order.
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = collect_matching_files(&self.source_root, &self.patterns)?;
        files.sort();
        Ok(files)
    }

    /// Run the task: clear the output subdirectory (where applicable), push
    /// every source file through every stage and write the results.
    ///
    /// Per-file transform failures are recorded in the manifest and do not
    /// stop the remaining files; IO failures abort this run.
    pub fn run(&self, notifier: &dyn ReloadNotifier) -> Result<OutputManifest> {
        let mut manifest = OutputManifest::default();

        if self.clear_output {
            clear_dir(&self.output_dir)?;
        } else {
            fs::create_dir_all(&self.output_dir)?;
        }

        let sources = self.source_files()?;
        debug!(task = %self.kind, files = sources.len(), "resolved source files");

        for (stage_idx, stage) in self.stages.iter().enumerate() {
            for src in &sources {
                let abs = self.source_root.join(src);
                let contents = fs::read(&abs)?;
                let rel_out = src.strip_prefix(&self.base).unwrap_or(src).to_path_buf();
                let input = FileData::new(rel_out, contents);

                match self.apply_stage(stage, input) {
                    Ok(outputs) => {
                        for out in outputs {
                            let dest = self.output_dir.join(&out.rel_path);
                            if let Some(parent) = dest.parent() {
                                fs::create_dir_all(parent)?;
                            }
                            fs::write(&dest, &out.contents)?;
                            manifest.written.push(dest);
                        }
                    }
                    Err(PipelineError::Transform { path, reason }) => {
                        warn!(
                            task = %self.kind,
                            stage = stage_idx,
                            file = %path.display(),
                            %reason,
                            "transform step rejected input"
                        );
                        manifest.failures.push(TransformFailure {
                            // Report the on-disk source path, not the
                            // pipeline-internal one.
                            path: abs.clone(),
                            reason,
                        });
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        if manifest.is_clean() {
            info!(
                task = %self.kind,
                written = manifest.written.len(),
                "task finished; notifying reload clients"
            );
            notifier.notify_clients();
        } else {
            warn!(
                task = %self.kind,
                written = manifest.written.len(),
                failed = manifest.failures.len(),
                "task finished with failures; reload suppressed"
            );
        }

        Ok(manifest)
    }

    /// Fold one file through a stage's step list.
    fn apply_stage(&self, stage: &[Box<dyn Transform>], input: FileData) -> Result<Vec<FileData>> {
        let mut current = vec![input];

        for step in stage {
            let mut next = Vec::with_capacity(current.len());
            for file in &current {
                next.extend(step.apply(file)?);
            }
            current = next;
        }

        Ok(current)
    }
}

/// Remove and recreate a directory, so stale outputs never linger.
fn clear_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// The full set of build tasks for a validated config.
#[derive(Debug)]
pub struct TaskSet {
    tasks: HashMap<AssetKind, TransformTask>,
}

impl TaskSet {
    /// Build every category's task, compiling its glob patterns and wiring
    /// its built-in stages.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut tasks = HashMap::new();

        for cat in cfg.categories() {
            let patterns = PatternSet::compile(&cat.src, &cat.exclude).map_err(|e| {
                PipelineError::Config(format!(
                    "invalid glob patterns for category '{}': {e}",
                    cat.kind
                ))
            })?;

            let stages = stages_for(cat.kind, cfg);
            let base = source_base(&cat.src);

            tasks.insert(
                cat.kind,
                TransformTask {
                    kind: cat.kind,
                    source_root: cfg.source_root().to_path_buf(),
                    output_dir: cfg.output_dir(cat.kind),
                    base,
                    patterns,
                    stages,
                    clear_output: cat.kind != AssetKind::Html,
                },
            );
        }

        Ok(Self { tasks })
    }

    pub fn task(&self, kind: AssetKind) -> &TransformTask {
        &self.tasks[&kind]
    }

    /// Run a single task by kind.
    pub fn run(&self, kind: AssetKind, notifier: &dyn ReloadNotifier) -> Result<OutputManifest> {
        self.task(kind).run(notifier)
    }
}

/// The built-in stage lists per category.
fn stages_for(kind: AssetKind, cfg: &ConfigFile) -> Vec<Vec<Box<dyn Transform>>> {
    let source_root = cfg.source_root().to_path_buf();

    match kind {
        AssetKind::Html => vec![vec![
            Box::new(include::IncludeResolver::new(source_root)) as Box<dyn Transform>,
            Box::new(html::WebpPictureRewrite::new()),
        ]],
        AssetKind::Css => vec![vec![
            Box::new(styles::SassCompile::new(source_root.join("scss"))) as Box<dyn Transform>,
            Box::new(styles::WebpClassRewrite),
            Box::new(styles::CssMinify),
        ]],
        AssetKind::Js => vec![vec![
            Box::new(include::IncludeResolver::new(source_root.join("js"))) as Box<dyn Transform>,
            Box::new(scripts::JsMinify),
        ]],
        // Two stages over the same inputs and output directory: the WebP
        // copies and the optimized originals have distinct extensions, so
        // neither stage can clobber the other.
        AssetKind::Img => vec![
            vec![Box::new(images::WebpConvert) as Box<dyn Transform>],
            vec![Box::new(images::ImageOptimize) as Box<dyn Transform>],
        ],
        AssetKind::Fonts => vec![vec![Box::new(fonts::FontConvert::woff_pair()) as Box<dyn Transform>]],
    }
}

/// Derive the leading directory shared by all source patterns, used to
/// relocate outputs (`scss/style.scss` → `style.css`, not
/// `scss/style.css`).
fn source_base(patterns: &[String]) -> PathBuf {
    let Some(first) = patterns.first() else {
        return PathBuf::new();
    };

    let Some((head, _)) = first.split_once('/') else {
        return PathBuf::new();
    };

    if head.contains('*') || head.contains('?') || head.contains('[') {
        return PathBuf::new();
    }

    // Only strip it if every pattern starts with the same literal component.
    let prefix = format!("{head}/");
    if patterns.iter().all(|p| p.starts_with(&prefix)) {
        PathBuf::from(head)
    } else {
        PathBuf::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_kind_round_trips_through_names() {
        for &kind in AssetKind::ALL {
            assert_eq!(kind.name().parse::<AssetKind>().unwrap(), kind);
        }
        assert!("wasm".parse::<AssetKind>().is_err());
    }

    #[test]
    fn source_base_requires_a_shared_literal_prefix() {
        let base = source_base(&["scss/**/*.scss".to_string()]);
        assert_eq!(base, PathBuf::from("scss"));

        let none = source_base(&["**/*.html".to_string()]);
        assert_eq!(none, PathBuf::new());

        let mixed = source_base(&["js/**/*.js".to_string(), "vendor/**/*.js".to_string()]);
        assert_eq!(mixed, PathBuf::new());
    }
}
