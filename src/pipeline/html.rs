// src/pipeline/html.rs

//! Markup post-processing: `<img>` → `<picture>` WebP rewriting.
//!
//! For every `<img>` whose `src` points at a raster image that the img task
//! also converts to WebP, the tag is wrapped in a `<picture>` element with a
//! `<source>` pointing at the `.webp` sibling, so capable browsers pick the
//! smaller encoding without any markup changes in the sources.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::Result;
use crate::pipeline::{FileData, Transform};

fn img_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<img\b[^>]*\bsrc\s*=\s*["']([^"']+\.(?:png|jpe?g|gif))["'][^>]*/?>"#)
            .unwrap_or_else(|e| unreachable!("img regex is a constant: {e}"))
    })
}

pub struct WebpPictureRewrite {
    _priv: (),
}

impl WebpPictureRewrite {
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl Default for WebpPictureRewrite {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for WebpPictureRewrite {
    fn name(&self) -> &'static str {
        "webp-picture"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let text = input.text()?;

        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in img_re().captures_iter(text) {
            let whole = caps
                .get(0)
                .unwrap_or_else(|| unreachable!("capture 0 always exists"));
            let src = &caps[1];

            let before = &text[..whole.start()];
            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            // Don't double-wrap images that are already inside a <picture>.
            if already_in_picture(before) {
                out.push_str(whole.as_str());
                continue;
            }

            let webp_src = replace_extension(src, "webp");
            out.push_str("<picture><source srcset=\"");
            out.push_str(&webp_src);
            out.push_str("\" type=\"image/webp\">");
            out.push_str(whole.as_str());
            out.push_str("</picture>");
        }

        out.push_str(&text[last..]);
        Ok(vec![FileData::new(input.rel_path.clone(), out.into_bytes())])
    }
}

/// True if the nearest unclosed picture element precedes this point.
fn already_in_picture(before: &str) -> bool {
    let open = before.rfind("<picture");
    let close = before.rfind("</picture");
    match (open, close) {
        (Some(o), Some(c)) => o > c,
        (Some(_), None) => true,
        _ => false,
    }
}

fn replace_extension(src: &str, ext: &str) -> String {
    match src.rfind('.') {
        Some(dot) => format!("{}.{ext}", &src[..dot]),
        None => format!("{src}.{ext}"),
    }
}
