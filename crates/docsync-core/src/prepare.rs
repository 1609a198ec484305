//! Content preparation: front matter extraction and body normalization.
//!
//! A document may open with a front matter block delimited by `---` marker
//! lines:
//!
//! ```text
//! ---
//! title: Getting Started
//! parent: Guides
//! ---
//! Body text...
//! ```
//!
//! The block is removed from the body. `title:` supplies the title; when a
//! `parent:` field is also present the title becomes `parent/title`. The
//! remaining body has every run of non-word characters collapsed to a
//! single space, which keeps the full-text tokenizer simple.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::prepare::prepare_content;
//!
//! let prepared = prepare_content("---\ntitle: Foo\n---\nBody text.");
//! assert_eq!(prepared.title, "Foo");
//! assert_eq!(prepared.body, "Body text");
//! ```

use regex::Regex;
use std::sync::LazyLock;

const MARKER: &str = "---";

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());
static TITLE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^title:\s+(.*?)\s*$").unwrap());
static PARENT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^parent:\s+(.*?)\s*$").unwrap());

/// Title and normalized body of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedContent {
    pub title: String,
    pub body: String,
}

/// Split raw text into title and normalized body.
pub fn prepare_content(raw: &str) -> PreparedContent {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let (title, body) = match split_front_matter(raw) {
        Some((front_matter, rest)) => (extract_title(front_matter), rest),
        None => (String::new(), raw),
    };
    PreparedContent {
        title,
        body: normalize_body(body),
    }
}

/// Collapse every run of non-word characters into one space.
pub fn normalize_body(text: &str) -> String {
    NON_WORD.replace_all(text, " ").trim().to_string()
}

/// Returns `(front_matter, rest)` when `text` opens with a closed block.
///
/// The front matter slice excludes both marker lines; `rest` starts right
/// after the closing marker line.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n');

    let first = lines.next()?;
    if !is_marker(first) {
        return None;
    }
    offset += first.len();
    let block_start = offset;

    for line in lines {
        if is_marker(line) {
            let block = &text[block_start..offset];
            let rest = &text[offset + line.len()..];
            return Some((block, rest));
        }
        offset += line.len();
    }
    None
}

fn is_marker(line: &str) -> bool {
    line.trim_end() == MARKER
}

fn extract_title(front_matter: &str) -> String {
    let title = field(&TITLE_FIELD, front_matter);
    let parent = field(&PARENT_FIELD, front_matter);
    match (parent, title) {
        (Some(parent), Some(title)) => format!("{}/{}", parent, title),
        (_, Some(title)) => title,
        (_, None) => String::new(),
    }
}

fn field(pattern: &Regex, front_matter: &str) -> Option<String> {
    pattern
        .captures(front_matter)
        .and_then(|c| c.get(1))
        .map(|m| unquote(m.as_str()).to_string())
        .filter(|v| !v.is_empty())
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
