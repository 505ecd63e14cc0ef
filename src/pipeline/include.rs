// src/pipeline/include.rs

//! `@@include("path")` directive resolution for markup and scripts.
//!
//! Include paths are resolved relative to the directory of the file that
//! contains the directive, so fragments can include further fragments.
//! Resolution is recursive with a depth guard, which also catches include
//! cycles.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{PipelineError, Result};
use crate::pipeline::{FileData, Transform};

const MAX_INCLUDE_DEPTH: usize = 16;

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"@@include\(\s*['"]([^'"]+)['"]\s*\)"#)
            .unwrap_or_else(|e| unreachable!("include regex is a constant: {e}"))
    })
}

/// Inlines `@@include("...")` directives.
pub struct IncludeResolver {
    /// Directory the task's sources live under; the top-level file's own
    /// directory is derived from its relative path.
    base_dir: PathBuf,
}

impl IncludeResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, origin: &Path, dir: &Path, text: &str, depth: usize) -> Result<String> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(PipelineError::transform(
                origin,
                format!("include depth exceeded {MAX_INCLUDE_DEPTH}; include cycle?"),
            ));
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in include_re().captures_iter(text) {
            let whole = caps
                .get(0)
                .unwrap_or_else(|| unreachable!("capture 0 always exists"));
            let rel = &caps[1];

            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            let target = dir.join(rel);
            let included = std::fs::read_to_string(&target).map_err(|e| {
                PipelineError::transform(origin, format!("cannot include {:?}: {e}", target))
            })?;

            let parent = target.parent().unwrap_or(dir).to_path_buf();
            let resolved = self.resolve(origin, &parent, &included, depth + 1)?;
            out.push_str(&resolved);
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

impl Transform for IncludeResolver {
    fn name(&self) -> &'static str {
        "include"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let text = input.text()?;

        if !text.contains("@@include") {
            return Ok(vec![input.clone()]);
        }

        let dir = match input.rel_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => self.base_dir.join(p),
            _ => self.base_dir.clone(),
        };

        let resolved = self.resolve(&input.rel_path, &dir, text, 0)?;
        Ok(vec![FileData::new(
            input.rel_path.clone(),
            resolved.into_bytes(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(resolver: &IncludeResolver, rel: &str, text: &str) -> Result<String> {
        let out = resolver.apply(&FileData::new(rel, text.as_bytes().to_vec()))?;
        Ok(String::from_utf8(out[0].contents.clone()).unwrap())
    }

    #[test]
    fn plain_files_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = IncludeResolver::new(dir.path());

        let out = apply(&resolver, "index.html", "<p>hello</p>").unwrap();
        assert_eq!(out, "<p>hello</p>");
    }

    #[test]
    fn nested_includes_are_inlined() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("parts")).unwrap();
        std::fs::write(
            dir.path().join("parts/header.html"),
            "<header>@@include('nav.html')</header>",
        )
        .unwrap();
        std::fs::write(dir.path().join("parts/nav.html"), "<nav/>").unwrap();

        let resolver = IncludeResolver::new(dir.path());
        let out = apply(
            &resolver,
            "index.html",
            "@@include(\"parts/header.html\")<main/>",
        )
        .unwrap();
        assert_eq!(out, "<header><nav/></header><main/>");
    }

    #[test]
    fn missing_include_is_a_transform_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = IncludeResolver::new(dir.path());

        let err = apply(&resolver, "index.html", "@@include('gone.html')").unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[test]
    fn include_cycles_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.html"), "@@include('b.html')").unwrap();
        std::fs::write(dir.path().join("b.html"), "@@include('a.html')").unwrap();

        let resolver = IncludeResolver::new(dir.path());
        let err = apply(&resolver, "index.html", "@@include('a.html')").unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }
}
