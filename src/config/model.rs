// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::pipeline::AssetKind;

/// Top-level configuration as read from `Assetpipe.toml`.
///
/// ```toml
/// [paths]
/// source_root = "src"
/// output_root = "dist"
///
/// [watch]
/// skip_unchanged = true
///
/// [category.css]
/// src = ["scss/**/*.scss"]
/// out = "css"
/// after = []
/// ```
///
/// All sections are optional; the defaults reproduce the classic
/// `src/` → `dist/` front-end layout.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Source and output roots from `[paths]`.
    #[serde(default)]
    pub paths: PathsSection,

    /// Watcher behaviour from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,

    /// Per-category overrides from `[category.<name>]`.
    ///
    /// Keys must be asset category names (`html`, `css`, `js`, `img`,
    /// `fonts`); anything else is rejected during validation.
    #[serde(default)]
    pub category: BTreeMap<String, CategoryOverride>,
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Directory containing the asset sources.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Directory all outputs are written into. Recreated empty on every
    /// full run.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

fn default_source_root() -> PathBuf {
    PathBuf::from("src")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            output_root: default_output_root(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WatchSection {
    /// When true, a change event only triggers a rebuild if the changed
    /// file's content hash actually differs from the last one seen.
    #[serde(default)]
    pub skip_unchanged: bool,
}

/// `[category.<name>]` section: overrides for one asset category.
///
/// Any field left out keeps its built-in default.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CategoryOverride {
    /// Source glob patterns, relative to the source root.
    #[serde(default)]
    pub src: Option<Vec<String>>,

    /// Watch glob patterns; if absent the source patterns are watched.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Exclusion glob patterns applied to both `src` and `watch`.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// Output subdirectory under the output root. Empty string means the
    /// output root itself.
    #[serde(default)]
    pub out: Option<String>,

    /// Build tasks that must finish successfully before this one runs.
    #[serde(default)]
    pub after: Option<Vec<String>>,
}

/// Resolved path configuration for one asset category.
#[derive(Debug, Clone)]
pub struct CategoryPaths {
    pub kind: AssetKind,
    /// Source glob patterns (relative to the source root).
    pub src: Vec<String>,
    /// Watch glob patterns (relative to the source root).
    pub watch: Vec<String>,
    /// Exclusion patterns applied when resolving files to emit.
    pub exclude: Vec<String>,
    /// Exclusion patterns applied to watch matching. Narrower than
    /// `exclude`: include partials are excluded from emission but still
    /// rebuild their consumers when edited.
    pub watch_exclude: Vec<String>,
    /// Output subdirectory under the output root ("" = the root).
    pub out: String,
    /// Direct dependencies among the build tasks.
    pub after: Vec<AssetKind>,
}

impl CategoryPaths {
    /// Built-in layout for a category, before config overrides.
    fn builtin(kind: AssetKind) -> Self {
        let (src, exclude, out): (&[&str], &[&str], &str) = match kind {
            // Markup lives at the top of the source root; `parts/` holds
            // include fragments that are not emitted as pages themselves.
            AssetKind::Html => (&["**/*.html"], &["parts/**"], ""),
            // Underscore-prefixed Sass partials are inputs to `@use`, not
            // entry points.
            AssetKind::Css => (&["scss/**/*.scss"], &["**/_*.scss"], "css"),
            AssetKind::Js => (&["js/**/*.js"], &[], "js"),
            AssetKind::Img => (&["img/**/*"], &[], "img"),
            AssetKind::Fonts => (&["fonts/**/*.ttf"], &[], "fonts"),
        };

        // Watch patterns default to the source patterns without the
        // emit-side exclusions, so edits to partials still rebuild the
        // pages that include them.
        let watch: Vec<String> = match kind {
            AssetKind::Html => vec!["**/*.html".to_string()],
            AssetKind::Css => vec!["scss/**/*.scss".to_string()],
            _ => src.iter().map(|s| s.to_string()).collect(),
        };
        let watch_exclude: Vec<String> = match kind {
            AssetKind::Html | AssetKind::Css => Vec::new(),
            _ => exclude.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            kind,
            src: src.iter().map(|s| s.to_string()).collect(),
            watch,
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            watch_exclude,
            out: out.to_string(),
            after: Vec::new(),
        }
    }
}

/// Validated configuration.
///
/// Constructed via `TryFrom<RawConfigFile>` in [`validate`](super::validate);
/// once built, all `after` references are known-valid and acyclic, and every
/// category's exclusion set contains the output root.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    paths: PathsSection,
    watch: WatchSection,
    categories: Vec<CategoryPaths>,
}

impl ConfigFile {
    /// Internal constructor used by validation; callers should go through
    /// `ConfigFile::try_from(raw)`.
    pub(crate) fn new_unchecked(
        paths: PathsSection,
        watch: WatchSection,
        categories: Vec<CategoryPaths>,
    ) -> Self {
        Self {
            paths,
            watch,
            categories,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.paths.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.paths.output_root
    }

    pub fn watch_section(&self) -> &WatchSection {
        &self.watch
    }

    /// All resolved categories, in a stable order.
    pub fn categories(&self) -> &[CategoryPaths] {
        &self.categories
    }

    /// Resolved paths for one category.
    pub fn category(&self, kind: AssetKind) -> &CategoryPaths {
        // All five kinds are always present after validation.
        self.categories
            .iter()
            .find(|c| c.kind == kind)
            .unwrap_or_else(|| unreachable!("category {kind} missing from validated config"))
    }

    /// Absolute output directory for a category.
    pub fn output_dir(&self, kind: AssetKind) -> PathBuf {
        let cat = self.category(kind);
        if cat.out.is_empty() {
            self.paths.output_root.clone()
        } else {
            self.paths.output_root.join(&cat.out)
        }
    }
}

/// Merge the built-in layout with config overrides for every category.
///
/// Returns categories in `AssetKind::ALL` order. Does not validate `after`
/// references; that happens in [`validate`](super::validate).
pub(crate) fn resolve_categories(
    raw: &RawConfigFile,
) -> Result<Vec<CategoryPaths>, crate::errors::PipelineError> {
    let mut categories = Vec::with_capacity(AssetKind::ALL.len());

    for &kind in AssetKind::ALL {
        let mut cat = CategoryPaths::builtin(kind);

        if let Some(overrides) = raw.category.get(kind.name()) {
            if let Some(src) = &overrides.src {
                cat.src = src.clone();
            }
            if let Some(watch) = &overrides.watch {
                cat.watch = watch.clone();
            } else if overrides.src.is_some() {
                // Overriding `src` without `watch` keeps them in sync.
                cat.watch = cat.src.clone();
            }
            if let Some(exclude) = &overrides.exclude {
                cat.exclude = exclude.clone();
                cat.watch_exclude = exclude.clone();
            }
            if let Some(out) = &overrides.out {
                cat.out = out.clone();
            }
            if let Some(after) = &overrides.after {
                cat.after = after
                    .iter()
                    .map(|name| {
                        name.parse::<AssetKind>().map_err(|_| {
                            crate::errors::PipelineError::Config(format!(
                                "category '{}' has unknown dependency '{}' in `after`",
                                kind, name
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
            }
        }

        categories.push(cat);
    }

    Ok(categories)
}
