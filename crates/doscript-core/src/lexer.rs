//! Statement segmentation.
//!
//! Splits raw script text into logical statement lines: comments (`#` and `//`)
//! are stripped, blank lines are dropped, and each surviving line keeps its
//! 1-based line number. Quote state is tracked character by character so that
//! comment markers inside string literals are preserved.

use std::path::Path;

use crate::error::{Origin, ScriptError};

/// One logical statement line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Segments `source` into statement lines. `file` is used for diagnostics only.
pub fn segment(source: &str, file: &Path) -> Result<Vec<SourceLine>, ScriptError> {
    let mut lines = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let code = strip_comment(raw).map_err(|_| {
            ScriptError::generic(format!("Unterminated string literal starting on line {}", number))
                .located(|| Origin {
                    file: file.to_path_buf(),
                    line: number,
                    text: raw.trim().to_string(),
                })
        })?;
        let trimmed = code.trim();
        if !trimmed.is_empty() {
            lines.push(SourceLine {
                number,
                text: trimmed.to_string(),
            });
        }
    }

    Ok(lines)
}

#[derive(Debug)]
struct Unterminated;

/// Returns the part of `line` before the first comment marker outside quotes.
fn strip_comment(line: &str) -> Result<&str, Unterminated> {
    let mut chars = line.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((idx, ch)) = chars.next() {
        match quote {
            Some(q) => match ch {
                '\\' => {
                    // Escaped character never closes the string.
                    chars.next();
                }
                c if c == q => quote = None,
                _ => {}
            },
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '#' => return Ok(&line[..idx]),
                '/' if matches!(chars.peek(), Some((_, '/'))) => return Ok(&line[..idx]),
                _ => {}
            },
        }
    }

    if quote.is_some() {
        return Err(Unterminated);
    }
    Ok(line)
}
