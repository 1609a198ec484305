//! Glob-based indexability filter for site files.

use anyhow::Result;
use docsync_core::paths::PathFilter;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Paths that are never indexed, whatever the site configures.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// A file is indexable when it matches an include glob and no exclude glob.
/// Matching ignores case.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl GlobFilter {
    pub fn new(include_globs: &[String], exclude_globs: &[String]) -> Result<Self> {
        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(exclude_globs.iter().cloned());
        Ok(Self {
            include: build_globset(include_globs)?,
            exclude: build_globset(&excludes)?,
        })
    }
}

impl PathFilter for GlobFilter {
    fn is_indexable(&self, relative_path: &str) -> bool {
        let path = relative_path.replace('\\', "/");
        let path = path.trim_start_matches('/');
        self.include.is_match(path) && !self.exclude.is_match(path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
