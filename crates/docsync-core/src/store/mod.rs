//! Index store abstraction.
//!
//! The [`IndexStore`] trait is the narrow contract the reconciliation run
//! needs from the search index: an identity-only snapshot, one bulk batch
//! submission with per-item outcomes, and a bulk delete for force rebuilds.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BatchAction, IndexEntry, ItemOutcome};
use crate::sync::SyncScope;

/// Abstract search index backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`query`](IndexStore::query) | Load `(id, path)` for every document in scope |
/// | [`submit_batch`](IndexStore::submit_batch) | Apply a batch, one outcome per action |
/// | [`delete_many`](IndexStore::delete_many) | Remove documents by id |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Identity fields of every document in the scope's tenant.
    async fn query(&self, scope: &SyncScope) -> Result<Vec<IndexEntry>>;

    /// Apply `actions` as one bulk operation.
    ///
    /// Returns one [`ItemOutcome`] per action, in order. An `Err` means the
    /// call itself failed; rejected items are reported through outcomes.
    async fn submit_batch(&self, scope: &SyncScope, actions: &[BatchAction]) -> Result<Vec<ItemOutcome>>;

    /// Delete documents by id, returning how many were removed.
    async fn delete_many(&self, scope: &SyncScope, ids: &[String]) -> Result<usize>;
}
