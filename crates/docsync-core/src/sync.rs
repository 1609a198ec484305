//! Reconciliation run orchestration.
//!
//! One run for one scope:
//!
//! 1. Load the identity snapshot from the [`IndexStore`].
//! 2. Drain the [`SourceTree`] enumeration for the scope's root.
//! 3. On force rebuild, wipe every indexed document of the scope.
//! 4. Classify every item with a [`Reconciler`].
//! 5. Fetch and prepare content for new and changed items, bounded by
//!    [`SyncOptions::concurrency`].
//! 6. Submit the batch once ([`execute_batch`]).
//!
//! A failure in steps 1–5 leaves the index untouched (apart from the
//! intentional force wipe). Reconciliation is idempotent, so a failed run
//! can simply be repeated.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::error::{ItemFailure, Result, SyncError};
use crate::models::{BatchAction, IndexedDocument, RepoItem};
use crate::paths::{DocPathMapper, PathFilter};
use crate::prepare::prepare_content;
use crate::reconcile::{ClassificationCounts, FetchRequest, Reconciler, Step};
use crate::source::SourceTree;
use crate::store::IndexStore;

/// What a run reconciles: a tenant partition of the index and the source
/// directory that feeds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncScope {
    pub tenant: Option<String>,
    /// Root directory within the source tree.
    pub root: String,
}

impl SyncScope {
    pub fn new(tenant: Option<String>, root: impl Into<String>) -> Self {
        Self {
            tenant,
            root: root.into(),
        }
    }
}

/// Per-run switches.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delete everything in scope first and re-upload every item.
    pub force: bool,
    /// Classify only; no deletes, no fetches, no batch.
    pub dry_run: bool,
    /// Maximum in-flight content fetches.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            concurrency: 4,
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Mutations applied by the batch (or planned, on a dry run).
    pub applied: usize,
    pub uploads: usize,
    pub merges: usize,
    pub deletes: usize,
    /// Documents removed up front by a force rebuild.
    pub force_deleted: usize,
    pub source_items: usize,
    pub counts: ClassificationCounts,
    pub dry_run: bool,
}

/// Reconcile one scope of the index against the source tree.
///
/// Returns the run summary; [`SyncReport::applied`] is the number of
/// mutations applied.
pub async fn reconcile<S, I>(
    source: &S,
    store: &I,
    scope: &SyncScope,
    mapper: &DocPathMapper,
    filter: &dyn PathFilter,
    options: &SyncOptions,
) -> Result<SyncReport>
where
    S: SourceTree + ?Sized,
    I: IndexStore + ?Sized,
{
    let snapshot = store.query(scope).await?;
    debug!(documents = snapshot.len(), tenant = ?scope.tenant, "loaded index snapshot");

    let items: Vec<RepoItem> = source.enumerate(&scope.root).try_collect().await?;
    debug!(items = items.len(), root = %scope.root, "enumerated source tree");

    let mut report = SyncReport {
        source_items: items.len(),
        dry_run: options.dry_run,
        ..Default::default()
    };

    let snapshot = if options.force {
        if !snapshot.is_empty() {
            let ids: Vec<String> = snapshot.iter().map(|e| e.id.clone()).collect();
            report.force_deleted = if options.dry_run {
                ids.len()
            } else {
                store.delete_many(scope, &ids).await?
            };
            info!(deleted = report.force_deleted, tenant = ?scope.tenant, "forced rebuild: index scope cleared");
        }
        Vec::new()
    } else {
        snapshot
    };

    let mut reconciler = Reconciler::new(mapper, filter, &snapshot);
    reconciler.observe_all(&items);
    let plan = reconciler.finish();
    report.counts = plan.counts.clone();

    if options.dry_run {
        for step in &plan.steps {
            match step {
                Step::Merge { .. } => report.merges += 1,
                Step::Delete { .. } => report.deletes += 1,
                Step::Fetch(_) => report.uploads += 1,
            }
        }
        report.applied = plan.steps.len();
        return Ok(report);
    }

    let requests: Vec<FetchRequest> = plan.fetch_requests().cloned().collect();
    let mut prepared = fetch_and_prepare(source, scope, requests, options.concurrency).await?;
    let batch = plan.into_batch(|req| prepared.remove(&req.item.content_hash));

    for action in &batch {
        match action {
            BatchAction::Upload(_) => report.uploads += 1,
            BatchAction::Merge { .. } => report.merges += 1,
            BatchAction::Delete { .. } => report.deletes += 1,
        }
    }
    report.applied = execute_batch(store, scope, &batch).await?;

    info!(
        applied = report.applied,
        uploads = report.uploads,
        merges = report.merges,
        deletes = report.deletes,
        tenant = ?scope.tenant,
        "reconciliation complete"
    );
    Ok(report)
}

/// Fetch and prepare content for every request, at most `concurrency`
/// at a time. The first failure aborts the run.
async fn fetch_and_prepare<S>(
    source: &S,
    scope: &SyncScope,
    requests: Vec<FetchRequest>,
    concurrency: usize,
) -> Result<HashMap<String, IndexedDocument>>
where
    S: SourceTree + ?Sized,
{
    let docs: Vec<IndexedDocument> = stream::iter(requests.into_iter().map(|req| async move {
        let text = source
            .fetch_content(&scope.root, &req.item.relative_path)
            .await
            .inspect_err(|e| {
                warn!(hash = %req.item.content_hash, path = %req.item.relative_path, error = %e, "content fetch failed");
            })?;
        let prepared = prepare_content(&text);
        debug!(hash = %req.item.content_hash, path = %req.item.relative_path, title = %prepared.title, "prepared content");
        Ok::<_, SyncError>(IndexedDocument {
            id: req.item.content_hash,
            path: req.doc_path,
            title: prepared.title,
            body: prepared.body,
            tenant: scope.tenant.clone(),
        })
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await?;

    Ok(docs.into_iter().map(|d| (d.id.clone(), d)).collect())
}

/// Submit a finished batch as one bulk operation.
///
/// An empty batch makes no store call. Items the store rejects are
/// collected into [`SyncError::PartialIndexFailure`].
pub async fn execute_batch<I>(store: &I, scope: &SyncScope, actions: &[BatchAction]) -> Result<usize>
where
    I: IndexStore + ?Sized,
{
    if actions.is_empty() {
        debug!("empty batch, nothing to submit");
        return Ok(0);
    }

    let outcomes = store.submit_batch(scope, actions).await?;
    if outcomes.len() != actions.len() {
        return Err(SyncError::Index(format!(
            "store reported {} outcomes for {} actions",
            outcomes.len(),
            actions.len()
        )));
    }

    let failed: Vec<ItemFailure> = outcomes
        .iter()
        .filter(|o| !o.succeeded)
        .map(|o| ItemFailure {
            id: o.id.clone(),
            message: o.message.clone().unwrap_or_else(|| "rejected".to_string()),
        })
        .collect();
    let applied = outcomes.len() - failed.len();

    if !failed.is_empty() {
        for f in &failed {
            error!(id = %f.id, reason = %f.message, "index rejected action");
        }
        return Err(SyncError::PartialIndexFailure { applied, failed });
    }
    Ok(applied)
}
