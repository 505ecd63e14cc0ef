// src/pipeline/styles.rs

//! Stylesheet pipeline: Sass compilation, WebP fallback rules, minification.
//!
//! Compilation is delegated to `grass`, minification to `lightningcss`; the
//! WebP rewrite in between emits an additional `.webp`-scoped rule for every
//! rule that references a raster image, mirroring what the img task produces.

use std::path::PathBuf;
use std::sync::OnceLock;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use regex::Regex;

use crate::errors::{PipelineError, Result};
use crate::pipeline::{FileData, Transform};

/// Compile `.scss` sources to expanded CSS.
pub struct SassCompile {
    /// Load path for `@use` / `@import` resolution.
    load_path: PathBuf,
}

impl SassCompile {
    pub fn new(load_path: impl Into<PathBuf>) -> Self {
        Self {
            load_path: load_path.into(),
        }
    }
}

impl Transform for SassCompile {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let source = input.text()?.to_string();

        let options = grass::Options::default()
            .style(grass::OutputStyle::Expanded)
            .load_path(&self.load_path);

        let css = grass::from_string(source, &options)
            .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))?;

        Ok(vec![input.with_extension("css", css.into_bytes())])
    }
}

fn bg_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"background(?:-image)?\s*:\s*[^;}]*url\(\s*['"]?([^'")]+\.(?:png|jpe?g))['"]?\s*\)"#)
            .unwrap_or_else(|e| unreachable!("background url regex is a constant: {e}"))
    })
}

/// Append a `.webp`-scoped variant for every top-level rule whose background
/// references a raster image.
///
/// The scoping class is expected to be set on `<html>` by a feature-detect
/// snippet in the page; browsers without it keep the original rule.
pub struct WebpClassRewrite;

impl Transform for WebpClassRewrite {
    fn name(&self) -> &'static str {
        "webp-css"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let css = input.text()?;

        let mut extra = String::new();
        for (selector, body) in top_level_rules(css) {
            for caps in bg_url_re().captures_iter(body) {
                let url = &caps[1];
                let webp_url = match url.rfind('.') {
                    Some(dot) => format!("{}.webp", &url[..dot]),
                    None => continue,
                };
                extra.push_str(&format!(
                    "\n.webp {selector} {{\n  background-image: url(\"{webp_url}\");\n}}\n"
                ));
            }
        }

        if extra.is_empty() {
            return Ok(vec![input.clone()]);
        }

        let mut out = css.to_string();
        out.push_str(&extra);
        Ok(vec![FileData::new(input.rel_path.clone(), out.into_bytes())])
    }
}

/// Iterate `selector { body }` pairs at nesting depth zero, skipping
/// at-rules. Deliberately conservative: rules inside `@media` blocks are
/// left untouched.
fn top_level_rules(css: &str) -> Vec<(&str, &str)> {
    let mut rules = Vec::new();
    let mut depth = 0usize;
    let mut sel_start = 0usize;
    let mut body_start = 0usize;

    for (i, ch) in css.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    body_start = i + 1;
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let selector = css[sel_start..body_start - 1].trim();
                    let body = &css[body_start..i];
                    if !selector.is_empty() && !selector.starts_with('@') {
                        rules.push((selector, body));
                    }
                    sel_start = i + 1;
                }
            }
            _ => {}
        }
    }

    rules
}

/// Minify via `lightningcss`.
pub struct CssMinify;

impl Transform for CssMinify {
    fn name(&self) -> &'static str {
        "css-minify"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let css = input.text()?;

        let mut sheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))?;

        sheet
            .minify(MinifyOptions::default())
            .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))?;

        let out = sheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| PipelineError::transform(&input.rel_path, e.to_string()))?;

        Ok(vec![FileData::new(
            input.rel_path.clone(),
            out.code.into_bytes(),
        )])
    }
}
