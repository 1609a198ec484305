//! Local directory source.
//!
//! Walks a directory with `walkdir` and identifies each file by the
//! SHA-256 of its bytes, so an unchanged file keeps its identity across
//! runs and renames. The walk is lazy: a file is read and hashed only
//! when the stream is polled for it.

use async_trait::async_trait;
use docsync_core::error::{Result, SyncError};
use docsync_core::models::RepoItem;
use docsync_core::source::SourceTree;
use futures::stream::{self, BoxStream, StreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, FilterEntry, WalkDir};

use crate::config::LocalSourceConfig;

pub struct LocalTree {
    base: PathBuf,
    follow_symlinks: bool,
}

impl LocalTree {
    pub fn new(config: &LocalSourceConfig) -> Self {
        Self {
            base: config.path.clone(),
            follow_symlinks: config.follow_symlinks,
        }
    }

    fn root_dir(&self, root: &str) -> PathBuf {
        self.base.join(root.trim_matches('/'))
    }
}

#[async_trait]
impl SourceTree for LocalTree {
    fn enumerate<'a>(&'a self, root: &'a str) -> BoxStream<'a, Result<RepoItem>> {
        let start = Walk {
            dir: self.root_dir(root),
            follow_symlinks: self.follow_symlinks,
            entries: None,
        };
        stream::try_unfold(start, |walk| async move {
            tokio::task::spawn_blocking(move || walk.advance())
                .await
                .map_err(|e| SyncError::Source(format!("directory walk failed: {}", e)))?
        })
        .boxed()
    }

    async fn fetch_content(&self, root: &str, relative_path: &str) -> Result<String> {
        let path = self.root_dir(root).join(relative_path);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SyncError::Source(format!("failed to read {}: {}", path.display(), e)))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

type Entries = FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

/// An in-progress walk. Each step runs on the blocking pool and reads
/// exactly one file.
struct Walk {
    dir: PathBuf,
    follow_symlinks: bool,
    entries: Option<Entries>,
}

impl Walk {
    fn advance(mut self) -> Result<Option<(RepoItem, Walk)>> {
        if self.entries.is_none() {
            if !self.dir.is_dir() {
                return Err(SyncError::InvalidScope(format!(
                    "root directory does not exist: {}",
                    self.dir.display()
                )));
            }
            let keep: fn(&DirEntry) -> bool = |e| e.depth() == 0 || !is_skipped_dir(e);
            self.entries = Some(
                WalkDir::new(&self.dir)
                    .follow_links(self.follow_symlinks)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(keep),
            );
        }

        let Some(entries) = self.entries.as_mut() else {
            return Ok(None);
        };
        let next = loop {
            match entries.next() {
                None => break None,
                Some(entry) => {
                    let entry = entry.map_err(|e| SyncError::Source(format!("walk error: {}", e)))?;
                    if entry.file_type().is_file() {
                        break Some(hash_file(&self.dir, entry.path())?);
                    }
                }
            }
        };
        Ok(next.map(|item| (item, self)))
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && matches!(entry.file_name().to_str(), Some(".git" | "target" | "node_modules"))
}

fn hash_file(dir: &Path, path: &Path) -> Result<RepoItem> {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    let rel_str = relative.to_string_lossy().replace('\\', "/");
    let bytes = std::fs::read(path)
        .map_err(|e| SyncError::Source(format!("failed to read {}: {}", path.display(), e)))?;
    Ok(RepoItem::new(hex::encode(Sha256::digest(&bytes)), rel_str))
}
