//! In-memory [`IndexStore`] implementation for testing.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Documents are keyed by
//! `(tenant, id)`. Merging into a missing document is rejected per item,
//! the same way a real search service rejects it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BatchAction, IndexEntry, IndexedDocument, ItemOutcome};
use crate::sync::SyncScope;

use super::IndexStore;

type Key = (Option<String>, String);

/// In-memory index for tests.
pub struct InMemoryIndexStore {
    docs: RwLock<HashMap<Key, IndexedDocument>>,
    /// Ids whose actions are rejected by `submit_batch`.
    reject: RwLock<HashSet<String>>,
    submit_calls: AtomicUsize,
    delete_many_calls: AtomicUsize,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            reject: RwLock::new(HashSet::new()),
            submit_calls: AtomicUsize::new(0),
            delete_many_calls: AtomicUsize::new(0),
        }
    }

    /// Seed a document directly, bypassing batches.
    pub fn insert(&self, doc: IndexedDocument) {
        let key = (doc.tenant.clone(), doc.id.clone());
        self.docs.write().unwrap().insert(key, doc);
    }

    pub fn get(&self, tenant: Option<&str>, id: &str) -> Option<IndexedDocument> {
        let key = (tenant.map(str::to_string), id.to_string());
        self.docs.read().unwrap().get(&key).cloned()
    }

    /// All documents of one tenant, sorted by path.
    pub fn documents(&self, tenant: Option<&str>) -> Vec<IndexedDocument> {
        let docs = self.docs.read().unwrap();
        let mut out: Vec<IndexedDocument> = docs
            .iter()
            .filter(|((t, _), _)| t.as_deref() == tenant)
            .map(|(_, d)| d.clone())
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out
    }

    /// Make every future action on `id` fail.
    pub fn reject_id(&self, id: impl Into<String>) {
        self.reject.write().unwrap().insert(id.into());
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn delete_many_calls(&self) -> usize {
        self.delete_many_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key(scope: &SyncScope, id: &str) -> Key {
    (scope.tenant.clone(), id.to_string())
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn query(&self, scope: &SyncScope) -> Result<Vec<IndexEntry>> {
        let docs = self.docs.read().unwrap();
        let mut entries: Vec<IndexEntry> = docs
            .iter()
            .filter(|((tenant, _), _)| *tenant == scope.tenant)
            .map(|(_, d)| IndexEntry::new(d.id.clone(), d.path.clone()))
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn submit_batch(&self, scope: &SyncScope, actions: &[BatchAction]) -> Result<Vec<ItemOutcome>> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let reject = self.reject.read().unwrap().clone();
        let mut docs = self.docs.write().unwrap();
        let mut outcomes = Vec::with_capacity(actions.len());

        for action in actions {
            let id = action.id();
            if reject.contains(id) {
                outcomes.push(ItemOutcome::failed(id, "rejected"));
                continue;
            }
            match action {
                BatchAction::Upload(doc) => {
                    let mut doc = doc.clone();
                    doc.tenant = scope.tenant.clone();
                    docs.insert(key(scope, &doc.id), doc);
                    outcomes.push(ItemOutcome::ok(id));
                }
                BatchAction::Merge { id, path } => match docs.get_mut(&key(scope, id)) {
                    Some(existing) => {
                        existing.path = path.clone();
                        outcomes.push(ItemOutcome::ok(id.as_str()));
                    }
                    None => outcomes.push(ItemOutcome::failed(id.as_str(), "document not found")),
                },
                BatchAction::Delete { id } => {
                    docs.remove(&key(scope, id));
                    outcomes.push(ItemOutcome::ok(id.as_str()));
                }
            }
        }
        Ok(outcomes)
    }

    async fn delete_many(&self, scope: &SyncScope, ids: &[String]) -> Result<usize> {
        self.delete_many_calls.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.write().unwrap();
        Ok(ids
            .iter()
            .filter(|id| docs.remove(&key(scope, id)).is_some())
            .count())
    }
}
