// src/pipeline/scripts.rs

//! Script pipeline: comment and blank-line stripping.
//!
//! Transpilation is deliberately out of scope; this step only removes `//`
//! and `/* */` comments (string- and template-literal-aware) and collapses
//! the blank lines left behind.

use crate::errors::Result;
use crate::pipeline::{FileData, Transform};

pub struct JsMinify;

impl Transform for JsMinify {
    fn name(&self) -> &'static str {
        "js-minify"
    }

    fn apply(&self, input: &FileData) -> Result<Vec<FileData>> {
        let text = input.text()?;
        let stripped = strip_comments(text);

        let mut out = String::with_capacity(stripped.len());
        for line in stripped.lines() {
            let trimmed = line.trim_end();
            if trimmed.trim_start().is_empty() {
                continue;
            }
            out.push_str(trimmed);
            out.push('\n');
        }

        Ok(vec![FileData::new(input.rel_path.clone(), out.into_bytes())])
    }
}

#[derive(PartialEq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(char),
}

/// Remove comments while leaving string and template literals intact.
///
/// Regex literals are not tracked; a `/` inside one followed by another `/`
/// could be misread as a comment start, so division-heavy one-liners should
/// keep their spacing. Acceptable for dev-pipeline minification.
fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut mode = Mode::Code;
    let mut chars = src.chars().peekable();

    while let Some(ch) = chars.next() {
        match mode {
            Mode::Code => match ch {
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        mode = Mode::LineComment;
                    }
                    Some('*') => {
                        chars.next();
                        mode = Mode::BlockComment;
                    }
                    _ => out.push(ch),
                },
                '"' | '\'' | '`' => {
                    mode = Mode::Str(ch);
                    out.push(ch);
                }
                _ => out.push(ch),
            },
            Mode::LineComment => {
                if ch == '\n' {
                    out.push('\n');
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    mode = Mode::Code;
                } else if ch == '\n' {
                    // Preserve line structure for later blank-line removal.
                    out.push('\n');
                }
            }
            Mode::Str(quote) => {
                out.push(ch);
                if ch == '\\' {
                    if let Some(esc) = chars.next() {
                        out.push(esc);
                    }
                } else if ch == quote {
                    mode = Mode::Code;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minify(js: &str) -> String {
        let out = JsMinify
            .apply(&FileData::new("app.js", js.as_bytes().to_vec()))
            .unwrap();
        String::from_utf8(out[0].contents.clone()).unwrap()
    }

    #[test]
    fn line_and_block_comments_are_stripped() {
        let out = minify("// header\nlet a = 1; /* mid */ let b = 2;\n/* multi\nline */\nlet c;\n");
        assert_eq!(out, "let a = 1;  let b = 2;\nlet c;\n");
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let out = minify("let url = \"https://example.com\";\nlet t = `a // b`;\n");
        assert!(out.contains("https://example.com"));
        assert!(out.contains("`a // b`"));
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let out = minify(r#"let s = "say \"hi\" // ok";"#);
        assert!(out.contains(r#"\"hi\" // ok"#));
    }

    #[test]
    fn blank_lines_are_collapsed() {
        let out = minify("let a;\n\n\n\nlet b;\n");
        assert_eq!(out, "let a;\nlet b;\n");
    }
}
