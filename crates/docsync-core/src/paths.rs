//! Document path derivation and indexability filters.
//!
//! `doc_path = prefix + strip_extension(relative_path) + suffix`. The
//! mapping is compared across runs, so it must stay pure: no clock, no
//! environment, no filesystem lookups.

use serde::Deserialize;

/// Maps repository-relative file paths to document paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocPathMapper {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl DocPathMapper {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Derive the document path for a relative source path.
    ///
    /// ```rust
    /// use docsync_core::paths::DocPathMapper;
    ///
    /// let mapper = DocPathMapper::new("/", "");
    /// assert_eq!(mapper.doc_path("docs/x.md"), "/docs/x");
    /// ```
    pub fn doc_path(&self, relative_path: &str) -> String {
        let normalized = normalize_separators(relative_path);
        let trimmed = normalized.trim_start_matches('/');
        format!("{}{}{}", self.prefix, strip_extension(trimmed), self.suffix)
    }
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Remove the final extension of the last path segment.
///
/// Dots in directory names are left alone, as are dot-files with no
/// further extension (`.env` stays `.env`).
pub fn strip_extension(path: &str) -> &str {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &path[segment_start..];
    match segment.rfind('.') {
        Some(0) | None => path,
        Some(dot) => &path[..segment_start + dot],
    }
}

/// Decides which source files carry indexable content.
pub trait PathFilter: Send + Sync {
    fn is_indexable(&self, relative_path: &str) -> bool;
}

/// Accepts files whose extension is in a fixed list (case-insensitive).
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn markdown() -> Self {
        Self::new(["md"])
    }
}

impl PathFilter for ExtensionFilter {
    fn is_indexable(&self, relative_path: &str) -> bool {
        let segment = relative_path.rsplit(['/', '\\']).next().unwrap_or(relative_path);
        match segment.rfind('.') {
            Some(dot) if dot > 0 => {
                let ext = segment[dot + 1..].to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}
