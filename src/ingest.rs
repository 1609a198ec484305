//! Site synchronization.
//!
//! Wires a configured site to the SQLite index and runs one reconciliation
//! pass for it:
//!
//! ```text
//! [sites.<name>] ──▶ SourceTree ──┐
//!                                 ├──▶ docsync_core::reconcile ──▶ SyncReport
//! SQLite documents ─▶ IndexStore ─┘
//! ```

use anyhow::{bail, Result};
use docsync_core::{SyncOptions, SyncReport};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::sites;
use crate::sqlite_store::SqliteIndexStore;

/// Reconcile one site against the index behind `pool`.
///
/// Errors from the run itself keep their [`docsync_core::SyncError`] type
/// inside the returned `anyhow::Error`.
pub async fn reconcile_site(
    config: &Config,
    pool: &SqlitePool,
    site: &str,
    force: bool,
    dry_run: bool,
) -> Result<SyncReport> {
    let runtime = sites::open_site(config, site)?;
    let store = SqliteIndexStore::new(pool.clone());
    let options = SyncOptions {
        force,
        dry_run,
        concurrency: config.sync.concurrency,
    };

    info!(site, root = %runtime.scope.root, force, dry_run, "reconciling site");
    let report = docsync_core::reconcile(
        runtime.source.as_ref(),
        &store,
        &runtime.scope,
        &runtime.mapper,
        &runtime.filter,
        &options,
    )
    .await?;
    Ok(report)
}

/// `docsync sync <site>|all`: reconcile and print a summary per site.
pub async fn run_sync(config: &Config, target: &str, force: bool, dry_run: bool) -> Result<()> {
    let names = if target == "all" {
        config.site_names()
    } else {
        sites::resolve(config, target)?;
        vec![target.to_string()]
    };

    if names.is_empty() {
        bail!("No sites configured. Add a [sites.<name>] section to the config.");
    }

    let pool = db::connect(config).await?;
    let mut failed = Vec::new();

    for name in &names {
        match reconcile_site(config, &pool, name, force, dry_run).await {
            Ok(report) => print_report(name, &report),
            Err(e) => {
                error!(site = %name, error = %e, "reconciliation failed");
                println!("sync {}", name);
                println!("  error: {:#}", e);
                failed.push(name.clone());
            }
        }
    }

    pool.close().await;

    if !failed.is_empty() {
        bail!("sync failed for site(s): {}", failed.join(", "));
    }
    Ok(())
}

fn print_report(site: &str, report: &SyncReport) {
    if report.dry_run {
        println!("sync {} (dry-run)", site);
    } else {
        println!("sync {}", site);
    }
    println!("  source items: {}", report.source_items);
    println!(
        "  indexed: {}  path changed: {}  content changed: {}  new: {}  orphaned: {}",
        report.counts.indexed,
        report.counts.path_changed,
        report.counts.content_changed,
        report.counts.new,
        report.counts.orphaned
    );
    println!(
        "  skipped: {}  duplicates: {}",
        report.counts.skipped, report.counts.duplicates
    );
    if report.force_deleted > 0 {
        println!("  force deleted: {}", report.force_deleted);
    }
    println!(
        "  uploads: {}  merges: {}  deletes: {}",
        report.uploads, report.merges, report.deletes
    );
    if report.dry_run {
        println!("  planned actions: {}", report.applied);
    } else {
        println!("  applied actions: {}", report.applied);
    }
    println!("ok");
}
