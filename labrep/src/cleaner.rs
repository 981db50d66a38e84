//! Text normalization for textarea input.
//!
//! Two passes exist and they run at different stages:
//! - [`clean_text`] is the strict pass applied to submitted fields. It collapses every
//!   run of blank lines to a single newline.
//! - [`normalize`] is the paragraph-preserving pass applied when long-form content is
//!   persisted. It keeps paragraph breaks and adds the spacing LaTeX fragments need.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Three or more consecutive newlines.
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Any run of blank lines, including whitespace-only ones.
static BLANK_LINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n+").unwrap());

/// A sentence-ending period followed by whitespace and a capital letter.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\.\s+)([A-Z])").unwrap());

/// `\end{...}` directly followed by a non-space character.
static END_ENV_GLUED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\end\{[^}]+\})(\S)").unwrap());

/// `\begin{...}` directly preceded by a non-space character.
static BEGIN_ENV_GLUED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S)(\\begin\{[^}]+\})").unwrap());

/// A line holding an `\item` with some text after it.
static ITEM_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\item[^\n]+").unwrap());

/// Minimum length (in characters) before sentence-based re-paragraphing kicks in.
const REPARAGRAPH_MIN_CHARS: usize = 100;

/// Normalizes long-form content before it is persisted.
///
/// Steps, in order:
/// 1. Trim; empty input yields an empty string.
/// 2. Collapse three or more newlines to exactly two.
/// 3. If the text is longer than 100 characters and has no paragraph break yet,
///    insert one after every period followed by a capital letter.
/// 4. Separate `\end{...}` from text glued after it and `\begin{...}` from text glued
///    before it with a blank line.
/// 5. Put a blank line after an `\item ...` line unless the next line is another
///    `\item`, an `\end`, or already blank.
///
/// # Arguments
///
/// * `text` - Raw content, usually a LaTeX fragment.
///
/// # Returns
///
/// The normalized content.
pub fn normalize(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let mut content = EXCESS_NEWLINES.replace_all(text, "\n\n").to_string();
    if !content.contains("\n\n") && content.chars().count() > REPARAGRAPH_MIN_CHARS {
        content = SENTENCE_BREAK.replace_all(&content, "$1\n\n$2").to_string();
    }
    content = END_ENV_GLUED.replace_all(&content, "$1\n\n$2").to_string();
    content = BEGIN_ENV_GLUED.replace_all(&content, "$1\n\n$2").to_string();
    space_after_items(&content)
}

/// Strict cleaning pass for submitted fields.
///
/// Trims the text and replaces every run of blank lines with a single newline.
pub fn clean_text(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    BLANK_LINE_RUN.replace_all(text, "\n").to_string()
}

fn space_after_items(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out = String::with_capacity(text.len() + 16);
    for (idx, line) in lines.iter().enumerate() {
        out.push_str(line);
        let Some(next) = lines.get(idx + 1) else {
            break;
        };
        out.push('\n');
        if ITEM_LINE.is_match(line)
            && !next.is_empty()
            && !next.starts_with("\\item")
            && !next.starts_with("\\end")
        {
            out.push('\n');
        }
    }
    out
}

/// Shape of a piece of LaTeX content, logged when content is saved or read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ContentStats {
    pub chars: usize,
    pub backslashes: usize,
    pub paragraphs: usize,
    pub begins: usize,
    pub ends: usize,
    pub items: usize,
}

impl ContentStats {
    pub fn of(text: &str) -> ContentStats {
        ContentStats {
            chars: text.chars().count(),
            backslashes: text.matches('\\').count(),
            paragraphs: text.matches("\n\n").count() + 1,
            begins: text.matches("\\begin{").count(),
            ends: text.matches("\\end{").count(),
            items: text.matches("\\item").count(),
        }
    }

    /// Content mentions `begin{` without the backslash, usually a lost escape.
    pub fn has_missing_backslashes(text: &str) -> bool {
        text.contains("begin{") && !text.contains("\\begin{")
    }
}

impl std::fmt::Display for ContentStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} chars, {} backslashes, {} paragraphs",
            self.chars, self.backslashes, self.paragraphs
        )
    }
}
