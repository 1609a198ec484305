//! Core data models used throughout docsync.
//!
//! A document's identity is its content hash: the same bytes at two paths
//! are one document, and an edited file becomes a new document.

use serde::{Deserialize, Serialize};

/// A source file as currently observed: content hash plus path relative
/// to the enumerated root. Recomputed every run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoItem {
    pub content_hash: String,
    pub relative_path: String,
}

impl RepoItem {
    pub fn new(content_hash: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// A document stored in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Content hash of the source file.
    pub id: String,
    /// Derived document path (see [`crate::paths::DocPathMapper`]).
    pub path: String,
    pub title: String,
    /// Normalized body text.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// Identity projection of an indexed document, as loaded by the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub path: String,
}

impl IndexEntry {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// One mutation queued for the single bulk commit of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum BatchAction {
    /// Create or fully replace the document with this id.
    Upload(IndexedDocument),
    /// Update only the path of an existing document.
    Merge { id: String, path: String },
    /// Remove the document with this id.
    Delete { id: String },
}

impl BatchAction {
    /// Identity this action targets.
    pub fn id(&self) -> &str {
        match self {
            BatchAction::Upload(doc) => &doc.id,
            BatchAction::Merge { id, .. } => id,
            BatchAction::Delete { id } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BatchAction::Upload(_) => "upload",
            BatchAction::Merge { .. } => "merge",
            BatchAction::Delete { .. } => "delete",
        }
    }
}

/// Per-item result reported by [`crate::store::IndexStore::submit_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: String,
    pub succeeded: bool,
    pub message: Option<String>,
}

impl ItemOutcome {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            succeeded: true,
            message: None,
        }
    }

    pub fn failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            succeeded: false,
            message: Some(message.into()),
        }
    }
}
