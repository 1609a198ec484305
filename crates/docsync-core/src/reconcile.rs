//! Reconciliation: classify source items against the index snapshot.
//!
//! The index snapshot is turned into two lookup maps, `hash → path` and
//! `path → hash`, and every [`RepoItem`] is classified hash-first with a
//! path fallback:
//!
//! | Hash known? | Path matches? | Path known? | Classification |
//! |-------------|---------------|-------------|----------------|
//! | yes | yes | – | [`Classification::Indexed`] |
//! | yes | no | – | [`Classification::PathChanged`] |
//! | no | – | yes, same hash | [`Classification::Indexed`] |
//! | no | – | yes, other hash | [`Classification::ContentChanged`] |
//! | no | – | no | [`Classification::New`] |
//!
//! The [`Reconciler`] only decides. It records a [`Plan`] of steps in item
//! order; steps that need fresh content are [`Step::Fetch`] requests that
//! the runner resolves into uploads. Nothing destructive leaves this module
//! before [`Reconciler::finish`] has run the orphan pass.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::models::{IndexEntry, RepoItem};
//! use docsync_core::paths::{DocPathMapper, ExtensionFilter};
//! use docsync_core::reconcile::{Classification, Reconciler, Step};
//!
//! let mapper = DocPathMapper::new("/", "");
//! let filter = ExtensionFilter::markdown();
//! let snapshot = vec![IndexEntry::new("a1", "/docs/x")];
//!
//! let mut reconciler = Reconciler::new(&mapper, &filter, &snapshot);
//! let outcome = reconciler.observe(&RepoItem::new("a1", "docs/y.md"));
//! assert_eq!(outcome.classification(), Some(Classification::PathChanged));
//!
//! let plan = reconciler.finish();
//! assert_eq!(plan.steps, vec![Step::Merge { id: "a1".into(), path: "/docs/y".into() }]);
//! ```

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::models::{BatchAction, IndexEntry, IndexedDocument, RepoItem};
use crate::paths::{DocPathMapper, PathFilter};

/// How a source item relates to the current index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Same content at the same path. Nothing to do.
    Indexed,
    /// Same content, different path. Path-only merge.
    PathChanged,
    /// Path known under a different content hash. Delete old, upload new.
    ContentChanged,
    /// Neither hash nor path known. Upload.
    New,
}

/// Result of observing one source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Classified(Classification),
    /// Another item already claimed this content hash during the pass.
    DuplicateContent { first_path: String },
    /// Another item already derived the same document path during the pass.
    DuplicatePath { doc_path: String },
}

impl Outcome {
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Outcome::Classified(c) => Some(*c),
            _ => None,
        }
    }
}

/// Content that must be fetched and prepared before it can be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub item: RepoItem,
    pub doc_path: String,
}

/// One planned mutation, in the order it was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Merge { id: String, path: String },
    Delete { id: String },
    Fetch(FetchRequest),
}

/// Per-run classification tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationCounts {
    pub indexed: usize,
    pub path_changed: usize,
    pub content_changed: usize,
    pub new: usize,
    /// New items whose type is not indexable.
    pub skipped: usize,
    pub duplicates: usize,
    pub orphaned: usize,
}

impl ClassificationCounts {
    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Indexed => self.indexed += 1,
            Classification::PathChanged => self.path_changed += 1,
            Classification::ContentChanged => self.content_changed += 1,
            Classification::New => self.new += 1,
        }
    }
}

/// The `hash → path` and `path → hash` views of the index.
///
/// Bijective while current. The [`Reconciler`] breaks and repairs this
/// item by item; [`LookupMaps::is_consistent`] holds again once a pass
/// finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupMaps {
    hash_to_path: HashMap<String, String>,
    path_to_hash: HashMap<String, String>,
}

impl LookupMaps {
    /// Build both maps from a snapshot.
    ///
    /// When two identities claim the same path, the first one owns it in
    /// `path_to_hash`; the other keeps its `hash_to_path` entry and is
    /// settled by classification or the orphan pass.
    pub fn from_entries(entries: &[IndexEntry]) -> Self {
        let mut maps = Self::default();
        for entry in entries {
            maps.hash_to_path
                .insert(entry.id.clone(), entry.path.clone());
            maps.path_to_hash
                .entry(entry.path.clone())
                .or_insert_with(|| entry.id.clone());
        }
        maps
    }

    pub fn classify(&self, hash: &str, doc_path: &str) -> Classification {
        if let Some(indexed_path) = self.hash_to_path.get(hash) {
            if indexed_path == doc_path {
                Classification::Indexed
            } else {
                Classification::PathChanged
            }
        } else if let Some(indexed_hash) = self.path_to_hash.get(doc_path) {
            if indexed_hash == hash {
                Classification::Indexed
            } else {
                Classification::ContentChanged
            }
        } else {
            Classification::New
        }
    }

    pub fn path_of(&self, hash: &str) -> Option<&str> {
        self.hash_to_path.get(hash).map(String::as_str)
    }

    pub fn hash_at(&self, doc_path: &str) -> Option<&str> {
        self.path_to_hash.get(doc_path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hash_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_to_path.is_empty()
    }

    pub fn clear(&mut self) {
        self.hash_to_path.clear();
        self.path_to_hash.clear();
    }

    /// True when the two maps are exact inverses.
    pub fn is_consistent(&self) -> bool {
        self.hash_to_path.len() == self.path_to_hash.len()
            && self
                .hash_to_path
                .iter()
                .all(|(hash, path)| self.path_to_hash.get(path) == Some(hash))
    }

    /// Record `hash` at `doc_path` in both directions.
    fn bind(&mut self, hash: &str, doc_path: &str) {
        self.hash_to_path
            .insert(hash.to_string(), doc_path.to_string());
        self.path_to_hash
            .insert(doc_path.to_string(), hash.to_string());
    }

    /// Move an identity to a new path, releasing its old path if it still
    /// owns it. Whatever identity held `doc_path` keeps its own
    /// `hash_to_path` entry so it can still be found by hash.
    fn relocate(&mut self, hash: &str, doc_path: &str) {
        if let Some(old_path) = self
            .hash_to_path
            .insert(hash.to_string(), doc_path.to_string())
        {
            if self.path_to_hash.get(&old_path).map(String::as_str) == Some(hash) {
                self.path_to_hash.remove(&old_path);
            }
        }
        self.path_to_hash
            .insert(doc_path.to_string(), hash.to_string());
    }

    /// Drop an identity from both maps.
    fn remove(&mut self, hash: &str) {
        if let Some(path) = self.hash_to_path.remove(hash) {
            if self.path_to_hash.get(&path).map(String::as_str) == Some(hash) {
                self.path_to_hash.remove(&path);
            }
        }
    }
}

/// The decided steps of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub counts: ClassificationCounts,
    /// Lookup maps as they will be once the batch is applied.
    pub maps: LookupMaps,
}

impl Plan {
    pub fn fetch_requests(&self) -> impl Iterator<Item = &FetchRequest> {
        self.steps.iter().filter_map(|s| match s {
            Step::Fetch(req) => Some(req),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Turn the plan into batch actions, resolving each fetch request
    /// through `resolve`. Requests that resolve to `None` are dropped.
    pub fn into_batch<F>(self, mut resolve: F) -> Vec<BatchAction>
    where
        F: FnMut(&FetchRequest) -> Option<IndexedDocument>,
    {
        self.steps
            .into_iter()
            .filter_map(|step| match step {
                Step::Merge { id, path } => Some(BatchAction::Merge { id, path }),
                Step::Delete { id } => Some(BatchAction::Delete { id }),
                Step::Fetch(req) => resolve(&req).map(BatchAction::Upload),
            })
            .collect()
    }
}

/// Single-writer classifier over the lookup maps.
pub struct Reconciler<'a> {
    mapper: &'a DocPathMapper,
    filter: &'a dyn PathFilter,
    maps: LookupMaps,
    /// Snapshot identities in load order, for a deterministic orphan pass.
    snapshot_ids: Vec<String>,
    /// Snapshot identities kept alive by this pass.
    seen: HashSet<String>,
    /// Identities superseded by a content change, with the index of their
    /// pending delete step.
    retired: HashMap<String, usize>,
    claimed_hashes: HashMap<String, String>,
    claimed_paths: HashSet<String>,
    steps: Vec<Option<Step>>,
    counts: ClassificationCounts,
}

impl<'a> Reconciler<'a> {
    pub fn new(mapper: &'a DocPathMapper, filter: &'a dyn PathFilter, snapshot: &[IndexEntry]) -> Self {
        Self {
            mapper,
            filter,
            maps: LookupMaps::from_entries(snapshot),
            snapshot_ids: snapshot.iter().map(|e| e.id.clone()).collect(),
            seen: HashSet::new(),
            retired: HashMap::new(),
            claimed_hashes: HashMap::new(),
            claimed_paths: HashSet::new(),
            steps: Vec::new(),
            counts: ClassificationCounts::default(),
        }
    }

    pub fn maps(&self) -> &LookupMaps {
        &self.maps
    }

    /// Observe a whole enumeration: indexable items first, then the rest,
    /// each group in enumeration order.
    ///
    /// A non-indexable file never shadows an indexable sibling that derives
    /// the same document path or carries the same content, whatever order
    /// the source listed them in.
    pub fn observe_all<'i, I>(&mut self, items: I) -> Vec<Outcome>
    where
        I: IntoIterator<Item = &'i RepoItem>,
    {
        let (indexable, rest): (Vec<&RepoItem>, Vec<&RepoItem>) = items
            .into_iter()
            .partition(|item| self.filter.is_indexable(&item.relative_path));
        indexable
            .into_iter()
            .chain(rest)
            .map(|item| self.observe(item))
            .collect()
    }

    /// Classify one source item and record the steps it requires.
    ///
    /// Only items that keep or produce a document claim their hash and
    /// document path: indexable items, and non-indexable items whose
    /// content is already indexed. Use [`Reconciler::observe_all`] when
    /// the enumeration mixes both kinds.
    pub fn observe(&mut self, item: &RepoItem) -> Outcome {
        let hash = item.content_hash.as_str();
        let doc_path = self.mapper.doc_path(&item.relative_path);
        let indexable = self.filter.is_indexable(&item.relative_path);

        if !indexable && self.maps.path_of(hash).is_none() {
            return self.observe_unindexed(item, doc_path);
        }

        if let Some(first_path) = self.claimed_hashes.get(hash) {
            warn!(hash, path = %item.relative_path, first = %first_path, "duplicate content, skipping");
            self.counts.duplicates += 1;
            return Outcome::DuplicateContent {
                first_path: first_path.clone(),
            };
        }
        if self.claimed_paths.contains(&doc_path) {
            warn!(hash, path = %item.relative_path, doc_path = %doc_path, "duplicate document path, skipping");
            self.counts.duplicates += 1;
            return Outcome::DuplicatePath { doc_path };
        }
        self.claimed_hashes
            .insert(hash.to_string(), item.relative_path.clone());
        self.claimed_paths.insert(doc_path.clone());

        let classification = self.maps.classify(hash, &doc_path);

        match classification {
            Classification::Indexed => {
                debug!(hash, doc_path = %doc_path, "already up to date");
                self.retract_delete(hash);
                self.seen.insert(hash.to_string());
                self.maps.bind(hash, &doc_path);
            }
            Classification::PathChanged => {
                let old_path = self.maps.path_of(hash).unwrap_or_default().to_string();
                self.retract_delete(hash);
                info!(hash, from = %old_path, to = %doc_path, "path changed");
                self.seen.insert(hash.to_string());
                self.maps.relocate(hash, &doc_path);
                self.push(Step::Merge {
                    id: hash.to_string(),
                    path: doc_path,
                });
            }
            Classification::ContentChanged => {
                self.retire_stale(hash, &doc_path);
                self.request_fetch(item, doc_path);
            }
            Classification::New => {
                info!(hash, doc_path = %doc_path, "new document");
                self.request_fetch(item, doc_path);
            }
        }

        self.counts.record(classification);
        Outcome::Classified(classification)
    }

    /// A non-indexable item whose content is not indexed. It never claims
    /// anything; at most it retires the stale document at its path.
    fn observe_unindexed(&mut self, item: &RepoItem, doc_path: String) -> Outcome {
        let hash = item.content_hash.as_str();

        if self.claimed_paths.contains(&doc_path) {
            debug!(hash, path = %item.relative_path, doc_path = %doc_path, "not indexable, path owned by an indexable file");
            self.counts.skipped += 1;
            return Outcome::DuplicatePath { doc_path };
        }

        let classification = self.maps.classify(hash, &doc_path);
        match classification {
            Classification::ContentChanged => {
                debug!(hash, path = %item.relative_path, "not indexable, stale entry removed only");
                self.retire_stale(hash, &doc_path);
            }
            _ => {
                debug!(hash, path = %item.relative_path, "not indexable, skipping");
                self.counts.skipped += 1;
            }
        }
        self.counts.record(classification);
        Outcome::Classified(classification)
    }

    /// Queue the delete of whatever identity currently sits at `doc_path`.
    fn retire_stale(&mut self, hash: &str, doc_path: &str) {
        let stale = self.maps.hash_at(doc_path).unwrap_or_default().to_string();
        if self.seen.contains(&stale) {
            debug!(hash, stale = %stale, "stale identity already kept elsewhere");
        } else if !self.retired.contains_key(&stale) {
            info!(hash, stale = %stale, doc_path = %doc_path, "content changed");
            let index = self.push(Step::Delete { id: stale.clone() });
            self.retired.insert(stale, index);
        }
        // The stale hash keeps its hash_to_path entry until the pass ends,
        // so a later copy of it classifies as a move.
        self.maps.path_to_hash.remove(doc_path);
    }

    /// Content retired earlier in this pass turned up again; keep its
    /// document instead of deleting it.
    fn retract_delete(&mut self, hash: &str) {
        if let Some(index) = self.retired.remove(hash) {
            self.steps[index] = None;
            debug!(hash, "retracted pending delete");
        }
    }

    /// Run the orphan pass and return the finished plan.
    pub fn finish(mut self) -> Plan {
        let orphans: Vec<String> = self
            .snapshot_ids
            .iter()
            .filter(|id| !self.seen.contains(*id) && !self.retired.contains_key(*id))
            .cloned()
            .collect();

        for id in orphans {
            info!(hash = %id, "orphaned, deleting");
            self.maps.remove(&id);
            self.counts.orphaned += 1;
            self.push(Step::Delete { id });
        }
        for id in self.retired.keys() {
            self.maps.hash_to_path.remove(id);
        }
        debug_assert!(self.maps.is_consistent(), "lookup maps diverged");

        Plan {
            steps: self.steps.into_iter().flatten().collect(),
            counts: self.counts,
            maps: self.maps,
        }
    }

    fn request_fetch(&mut self, item: &RepoItem, doc_path: String) {
        self.maps.bind(&item.content_hash, &doc_path);
        self.push(Step::Fetch(FetchRequest {
            item: item.clone(),
            doc_path,
        }));
    }

    fn push(&mut self, step: Step) -> usize {
        self.steps.push(Some(step));
        self.steps.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ExtensionFilter;
    use std::collections::BTreeMap;

    fn plan(snapshot: &[IndexEntry], items: &[RepoItem]) -> Plan {
        let mapper = DocPathMapper::new("/", "");
        let filter = ExtensionFilter::markdown();
        let mut r = Reconciler::new(&mapper, &filter, snapshot);
        for item in items {
            r.observe(item);
        }
        r.finish()
    }

    fn merge(id: &str, path: &str) -> Step {
        Step::Merge {
            id: id.to_string(),
            path: path.to_string(),
        }
    }

    fn delete(id: &str) -> Step {
        Step::Delete { id: id.to_string() }
    }

    fn fetch(hash: &str, rel: &str, doc_path: &str) -> Step {
        Step::Fetch(FetchRequest {
            item: RepoItem::new(hash, rel),
            doc_path: doc_path.to_string(),
        })
    }

    #[test]
    fn test_classify_table() {
        let maps = LookupMaps::from_entries(&[
            IndexEntry::new("a1", "/docs/x"),
            IndexEntry::new("b1", "/docs/z"),
        ]);
        assert_eq!(maps.classify("a1", "/docs/x"), Classification::Indexed);
        assert_eq!(maps.classify("a1", "/docs/y"), Classification::PathChanged);
        assert_eq!(maps.classify("c1", "/docs/z"), Classification::ContentChanged);
        assert_eq!(maps.classify("c1", "/docs/q"), Classification::New);
    }

    #[test]
    fn test_new_item_fetches() {
        let p = plan(&[], &[RepoItem::new("a1", "docs/x.md")]);
        assert_eq!(p.steps, vec![fetch("a1", "docs/x.md", "/docs/x")]);
        assert_eq!(p.counts.new, 1);
        assert!(p.maps.is_consistent());
        assert_eq!(p.maps.path_of("a1"), Some("/docs/x"));
    }

    #[test]
    fn test_unchanged_is_noop() {
        let p = plan(
            &[IndexEntry::new("a1", "/docs/x")],
            &[RepoItem::new("a1", "docs/x.md")],
        );
        assert!(p.is_empty());
        assert_eq!(p.counts.indexed, 1);
    }

    #[test]
    fn test_rename_is_single_merge() {
        let p = plan(
            &[IndexEntry::new("a1", "/docs/x")],
            &[RepoItem::new("a1", "docs/y.md")],
        );
        assert_eq!(p.steps, vec![merge("a1", "/docs/y")]);
        assert_eq!(p.fetch_requests().count(), 0);
        assert_eq!(p.maps.path_of("a1"), Some("/docs/y"));
        assert_eq!(p.maps.hash_at("/docs/x"), None);
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_content_change_deletes_then_fetches() {
        let p = plan(
            &[IndexEntry::new("a1", "/docs/y")],
            &[RepoItem::new("a2", "docs/y.md")],
        );
        assert_eq!(
            p.steps,
            vec![delete("a1"), fetch("a2", "docs/y.md", "/docs/y")]
        );
        assert_eq!(p.counts.content_changed, 1);
        assert_eq!(p.counts.orphaned, 0);
        assert_eq!(p.maps.path_of("a1"), None);
        assert_eq!(p.maps.hash_at("/docs/y"), Some("a2"));
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_orphans_deleted() {
        let p = plan(
            &[
                IndexEntry::new("a1", "/docs/x"),
                IndexEntry::new("b1", "/docs/gone"),
            ],
            &[RepoItem::new("a1", "docs/x.md")],
        );
        assert_eq!(p.steps, vec![delete("b1")]);
        assert_eq!(p.counts.orphaned, 1);
        assert_eq!(p.maps.len(), 1);
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_swapped_paths_merge_both() {
        let p = plan(
            &[
                IndexEntry::new("h1", "/a"),
                IndexEntry::new("h2", "/b"),
            ],
            &[RepoItem::new("h1", "b.md"), RepoItem::new("h2", "a.md")],
        );
        assert_eq!(p.steps, vec![merge("h1", "/b"), merge("h2", "/a")]);
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_rename_onto_deleted_file_path() {
        // a.md was deleted and b.md renamed to a.md.
        let p = plan(
            &[
                IndexEntry::new("h1", "/a"),
                IndexEntry::new("h2", "/b"),
            ],
            &[RepoItem::new("h2", "a.md")],
        );
        assert_eq!(p.steps, vec![merge("h2", "/a"), delete("h1")]);
        assert_eq!(p.maps.hash_at("/a"), Some("h2"));
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_superseded_content_reappearing_is_kept() {
        // x.md was edited; its old content was copied to z.md.
        let p = plan(
            &[IndexEntry::new("old", "/x")],
            &[RepoItem::new("new", "x.md"), RepoItem::new("old", "z.md")],
        );
        assert_eq!(
            p.steps,
            vec![fetch("new", "x.md", "/x"), merge("old", "/z")]
        );
        assert!(!p.steps.contains(&delete("old")));
        assert!(p.maps.is_consistent());
        assert_eq!(p.maps.path_of("old"), Some("/z"));
    }

    #[test]
    fn test_duplicate_content_first_wins() {
        let mapper = DocPathMapper::new("/", "");
        let filter = ExtensionFilter::markdown();
        let mut r = Reconciler::new(&mapper, &filter, &[]);
        assert_eq!(
            r.observe(&RepoItem::new("h", "a.md")).classification(),
            Some(Classification::New)
        );
        assert_eq!(
            r.observe(&RepoItem::new("h", "b.md")),
            Outcome::DuplicateContent {
                first_path: "a.md".to_string()
            }
        );
        let p = r.finish();
        assert_eq!(p.steps, vec![fetch("h", "a.md", "/a")]);
        assert_eq!(p.counts.duplicates, 1);
    }

    #[test]
    fn test_duplicate_doc_path_skipped() {
        let mapper = DocPathMapper::new("/", "");
        let filter = ExtensionFilter::new(["md", "markdown"]);
        let mut r = Reconciler::new(&mapper, &filter, &[]);
        r.observe(&RepoItem::new("h1", "a.md"));
        let outcome = r.observe(&RepoItem::new("h2", "a.markdown"));
        assert_eq!(
            outcome,
            Outcome::DuplicatePath {
                doc_path: "/a".to_string()
            }
        );
        assert_eq!(r.finish().steps.len(), 1);
    }

    #[test]
    fn test_non_indexable_new_skipped() {
        let p = plan(&[], &[RepoItem::new("h", "image.png")]);
        assert!(p.is_empty());
        assert_eq!(p.counts.skipped, 1);
        assert!(p.maps.is_empty());
    }

    #[test]
    fn test_non_indexable_previously_indexed_cleaned_up() {
        // A file that used to be Markdown is now .txt with new content.
        let p = plan(
            &[IndexEntry::new("h1", "/notes")],
            &[RepoItem::new("h2", "notes.txt")],
        );
        assert_eq!(p.steps, vec![delete("h1")]);
        assert!(p.maps.is_empty());
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_non_indexable_rename_still_merges() {
        let p = plan(
            &[IndexEntry::new("h1", "/notes")],
            &[RepoItem::new("h1", "archive/notes.txt")],
        );
        assert_eq!(p.steps, vec![merge("h1", "/archive/notes")]);
    }

    #[test]
    fn test_non_indexable_sibling_does_not_block_upload() {
        let p = plan(
            &[],
            &[RepoItem::new("h_html", "intro.html"), RepoItem::new("h_md", "intro.md")],
        );
        assert_eq!(p.steps, vec![fetch("h_md", "intro.md", "/intro")]);
        assert_eq!(p.counts.skipped, 1);
        assert_eq!(p.counts.duplicates, 0);
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_non_indexable_sibling_keeps_indexed_document() {
        let p = plan(
            &[IndexEntry::new("h_md", "/intro")],
            &[RepoItem::new("h_html", "intro.html"), RepoItem::new("h_md", "intro.md")],
        );
        assert!(p.is_empty(), "unexpected steps: {:?}", p.steps);
        assert_eq!(p.maps.hash_at("/intro"), Some("h_md"));
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_non_indexable_copy_does_not_claim_content() {
        let p = plan(
            &[],
            &[RepoItem::new("h1", "copy.txt"), RepoItem::new("h1", "guide.md")],
        );
        assert_eq!(p.steps, vec![fetch("h1", "guide.md", "/guide")]);
    }

    #[test]
    fn test_non_indexable_sibling_with_edited_markdown() {
        let p = plan(
            &[IndexEntry::new("h_md", "/intro")],
            &[RepoItem::new("h_html", "intro.html"), RepoItem::new("h_md2", "intro.md")],
        );
        assert_eq!(
            p.steps,
            vec![delete("h_md"), fetch("h_md2", "intro.md", "/intro")]
        );
        assert!(p.maps.is_consistent());
    }

    /// Final `id → path` state after applying `steps` to `snapshot`.
    fn apply(snapshot: &[IndexEntry], steps: &[Step]) -> BTreeMap<String, String> {
        let mut index: BTreeMap<String, String> = snapshot
            .iter()
            .map(|e| (e.id.clone(), e.path.clone()))
            .collect();
        for step in steps {
            match step {
                Step::Merge { id, path } => {
                    index.insert(id.clone(), path.clone());
                }
                Step::Delete { id } => {
                    index.remove(id);
                }
                Step::Fetch(req) => {
                    index.insert(req.item.content_hash.clone(), req.doc_path.clone());
                }
            }
        }
        index
    }

    #[test]
    fn test_observe_all_is_order_independent() {
        let mapper = DocPathMapper::new("/", "");
        let filter = ExtensionFilter::markdown();
        let cases: Vec<(Vec<IndexEntry>, Vec<RepoItem>)> = vec![
            (vec![], vec![RepoItem::new("h_html", "intro.html"), RepoItem::new("h_md", "intro.md")]),
            (
                vec![IndexEntry::new("h_md", "/intro")],
                vec![RepoItem::new("h_html", "intro.html"), RepoItem::new("h_md", "intro.md")],
            ),
            (
                vec![IndexEntry::new("h_md", "/intro")],
                vec![RepoItem::new("h_txt", "intro.txt"), RepoItem::new("h_new", "intro.md")],
            ),
            (
                vec![IndexEntry::new("h1", "/guide")],
                vec![RepoItem::new("h1", "copy.txt"), RepoItem::new("h1", "guide.md")],
            ),
            (vec![], vec![RepoItem::new("h1", "copy.txt"), RepoItem::new("h1", "guide.md")]),
        ];

        for (snapshot, items) in cases {
            let mut forward = Reconciler::new(&mapper, &filter, &snapshot);
            forward.observe_all(&items);
            let forward = forward.finish();

            let reversed_items: Vec<RepoItem> = items.iter().rev().cloned().collect();
            let mut backward = Reconciler::new(&mapper, &filter, &snapshot);
            backward.observe_all(&reversed_items);
            let backward = backward.finish();

            assert_eq!(
                apply(&snapshot, &forward.steps),
                apply(&snapshot, &backward.steps),
                "order changed the outcome for {:?}",
                items
            );
            assert!(forward.maps.is_consistent());
            assert!(backward.maps.is_consistent());

            // Every Markdown item ends up indexed at its own path.
            let index = apply(&snapshot, &forward.steps);
            for item in items.iter().filter(|i| filter.is_indexable(&i.relative_path)) {
                assert_eq!(
                    index.get(&item.content_hash).map(String::as_str),
                    Some(mapper.doc_path(&item.relative_path).as_str()),
                );
            }
        }
    }

    #[test]
    fn test_inconsistent_snapshot_repaired() {
        let p = plan(
            &[IndexEntry::new("h1", "/a"), IndexEntry::new("h2", "/a")],
            &[RepoItem::new("h2", "a.md")],
        );
        assert_eq!(p.steps, vec![delete("h1")]);
        assert_eq!(p.maps.hash_at("/a"), Some("h2"));
        assert!(p.maps.is_consistent());
    }

    #[test]
    fn test_classification_totality() {
        let snapshot = vec![
            IndexEntry::new("keep", "/keep"),
            IndexEntry::new("move", "/old"),
            IndexEntry::new("stale", "/edit"),
        ];
        let items = vec![
            RepoItem::new("keep", "keep.md"),
            RepoItem::new("move", "new.md"),
            RepoItem::new("fresh", "edit.md"),
            RepoItem::new("brand", "brand.md"),
        ];
        let mapper = DocPathMapper::new("/", "");
        let filter = ExtensionFilter::markdown();
        let mut r = Reconciler::new(&mapper, &filter, &snapshot);
        let got: Vec<_> = items
            .iter()
            .map(|i| r.observe(i).classification())
            .collect();
        assert_eq!(
            got,
            vec![
                Some(Classification::Indexed),
                Some(Classification::PathChanged),
                Some(Classification::ContentChanged),
                Some(Classification::New),
            ]
        );
        let p = r.finish();
        assert_eq!(p.counts.indexed + p.counts.path_changed + p.counts.content_changed + p.counts.new, 4);
    }

    #[test]
    fn test_into_batch_resolves_fetches_in_order() {
        let p = plan(
            &[IndexEntry::new("a1", "/docs/y")],
            &[RepoItem::new("a2", "docs/y.md")],
        );
        let batch = p.into_batch(|req| {
            Some(IndexedDocument {
                id: req.item.content_hash.clone(),
                path: req.doc_path.clone(),
                title: String::new(),
                body: String::new(),
                tenant: None,
            })
        });
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], BatchAction::Delete { id: "a1".into() });
        assert_eq!(batch[1].id(), "a2");
        assert_eq!(batch[1].kind(), "upload");
    }
}
