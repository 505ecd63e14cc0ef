// src/watch/patterns.rs

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::config::ConfigFile;
use crate::errors::{PipelineError, Result};
use crate::pipeline::AssetKind;

/// Compiled include/exclude glob patterns.
///
/// Patterns are relative to the source root; `matches` takes the same
/// relative, forward-slash form (e.g. `"scss/style.scss"`).
#[derive(Clone)]
pub struct PatternSet {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet").finish_non_exhaustive()
    }
}

impl PatternSet {
    pub fn compile(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = build_globset(include)?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };
        Ok(Self { include, exclude })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|e| PipelineError::Config(format!("invalid glob pattern '{pat}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| PipelineError::Config(format!("building glob set: {e}")))
}

/// Compiled watch patterns for one asset category.
#[derive(Debug, Clone)]
pub struct WatchProfile {
    pub kind: AssetKind,
    pub patterns: PatternSet,
}

impl WatchProfile {
    pub fn matches(&self, rel_path: &str) -> bool {
        self.patterns.matches(rel_path)
    }
}

/// Compile the watch profile for one category; failures are watch errors,
/// not config errors, since the config itself already validated.
fn compile_watch_profile(cat: &crate::config::CategoryPaths) -> Result<WatchProfile> {
    let patterns = PatternSet::compile(&cat.watch, &cat.watch_exclude)
        .map_err(|e| PipelineError::Watch(format!("category '{}': {e}", cat.kind)))?;
    Ok(WatchProfile {
        kind: cat.kind,
        patterns,
    })
}

/// Compile a watch profile for every category.
///
/// A category with broken watch patterns is logged and left unwatched; the
/// remaining categories still get their profiles, so one bad override does
/// not take down the whole watcher.
pub fn build_watch_profiles(cfg: &ConfigFile) -> Vec<WatchProfile> {
    let mut profiles = Vec::with_capacity(cfg.categories().len());

    for cat in cfg.categories() {
        match compile_watch_profile(cat) {
            Ok(profile) => profiles.push(profile),
            Err(e) => {
                warn!(category = %cat.kind, error = %e, "skipping watch profile");
            }
        }
    }

    profiles
}

/// Collect all files under `root` matching the pattern set, as paths
/// relative to `root`.
pub fn collect_matching_files(root: &Path, patterns: &PatternSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    if patterns.matches(&relative_str(rel)) {
                        files.push(rel.to_path_buf());
                    }
                }
            }
        }
    }

    Ok(files)
}

/// Forward-slash rendering of a relative path for glob matching.
pub fn relative_str(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_and_exclude_interact() {
        let set = PatternSet::compile(
            &["scss/**/*.scss".to_string()],
            &["**/_*.scss".to_string()],
        )
        .unwrap();

        assert!(set.matches("scss/style.scss"));
        assert!(set.matches("scss/pages/home.scss"));
        assert!(!set.matches("scss/_mixins.scss"));
        assert!(!set.matches("js/app.js"));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = PatternSet::compile(&["[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn collect_walks_recursively_and_returns_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("scss/pages")).unwrap();
        fs::write(root.join("scss/style.scss"), "").unwrap();
        fs::write(root.join("scss/pages/home.scss"), "").unwrap();
        fs::write(root.join("scss/_vars.scss"), "").unwrap();
        fs::write(root.join("readme.md"), "").unwrap();

        let set = PatternSet::compile(
            &["scss/**/*.scss".to_string()],
            &["**/_*.scss".to_string()],
        )
        .unwrap();

        let mut files = collect_matching_files(root, &set).unwrap();
        files.sort();
        assert_eq!(
            files,
            vec![
                PathBuf::from("scss/pages/home.scss"),
                PathBuf::from("scss/style.scss"),
            ]
        );
    }

    #[test]
    fn broken_watch_patterns_are_a_watch_error() {
        let cat = crate::config::CategoryPaths {
            kind: AssetKind::Css,
            src: vec!["scss/**/*.scss".to_string()],
            watch: vec!["[".to_string()],
            exclude: Vec::new(),
            watch_exclude: Vec::new(),
            out: "css".to_string(),
            after: Vec::new(),
        };

        let err = compile_watch_profile(&cat).unwrap_err();
        assert!(matches!(err, PipelineError::Watch(_)));
    }

    #[test]
    fn scss_change_maps_to_the_css_task_only() {
        let raw = crate::config::RawConfigFile::default();
        let cfg = ConfigFile::try_from(raw).unwrap();
        let profiles = build_watch_profiles(&cfg);

        let matching: Vec<_> = profiles
            .iter()
            .filter(|p| p.matches("scss/style.scss"))
            .map(|p| p.kind)
            .collect();
        assert_eq!(matching, vec![AssetKind::Css]);

        // Partials are watched even though they are not emitted.
        assert!(profiles
            .iter()
            .any(|p| p.kind == AssetKind::Css && p.matches("scss/_vars.scss")));
    }

    #[test]
    fn collect_of_missing_root_is_empty() {
        let set = PatternSet::compile(&["**/*".to_string()], &[]).unwrap();
        let files = collect_matching_files(Path::new("/no/such/dir"), &set).unwrap();
        assert!(files.is_empty());
    }
}
