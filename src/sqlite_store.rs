//! SQLite-backed [`IndexStore`].
//!
//! Documents live in the `documents` table keyed by `(site, id)`; the
//! `documents_fts` table mirrors `title` and `body` for search. A batch runs
//! in one transaction, and every action reports its own outcome.

use async_trait::async_trait;
use chrono::Utc;
use docsync_core::error::{Result, SyncError};
use docsync_core::models::{BatchAction, IndexEntry, IndexedDocument, ItemOutcome};
use docsync_core::store::IndexStore;
use docsync_core::SyncScope;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

pub struct SqliteIndexStore {
    pool: SqlitePool,
}

impl SqliteIndexStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All documents stored for `site`, sorted by path.
    pub async fn documents(&self, site: Option<&str>) -> Result<Vec<IndexedDocument>> {
        let key = site.unwrap_or("");
        let rows = sqlx::query(
            "SELECT id, path, title, body FROM documents WHERE site = ? ORDER BY path, id",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(index_err)?;

        Ok(rows
            .iter()
            .map(|row| IndexedDocument {
                id: row.get("id"),
                path: row.get("path"),
                title: row.get("title"),
                body: row.get("body"),
                tenant: site.map(str::to_string),
            })
            .collect())
    }
}

fn site_key(scope: &SyncScope) -> &str {
    scope.tenant.as_deref().unwrap_or("")
}

fn index_err(e: sqlx::Error) -> SyncError {
    SyncError::Index(e.to_string())
}

async fn upsert_document(
    conn: &mut SqliteConnection,
    site: &str,
    doc: &IndexedDocument,
    indexed_at: i64,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO documents (site, id, path, title, body, indexed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(site, id) DO UPDATE SET
            path = excluded.path,
            title = excluded.title,
            body = excluded.body,
            indexed_at = excluded.indexed_at
        "#,
    )
    .bind(site)
    .bind(&doc.id)
    .bind(&doc.path)
    .bind(&doc.title)
    .bind(&doc.body)
    .bind(indexed_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM documents_fts WHERE site = ? AND id = ?")
        .bind(site)
        .bind(&doc.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO documents_fts (site, id, title, body) VALUES (?, ?, ?, ?)")
        .bind(site)
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.body)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn delete_document(conn: &mut SqliteConnection, site: &str, id: &str) -> std::result::Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM documents_fts WHERE site = ? AND id = ?")
        .bind(site)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    let removed = sqlx::query("DELETE FROM documents WHERE site = ? AND id = ?")
        .bind(site)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(removed > 0)
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn query(&self, scope: &SyncScope) -> Result<Vec<IndexEntry>> {
        let rows = sqlx::query("SELECT id, path FROM documents WHERE site = ? ORDER BY id")
            .bind(site_key(scope))
            .fetch_all(&self.pool)
            .await
            .map_err(index_err)?;

        Ok(rows
            .iter()
            .map(|row| IndexEntry::new(row.get::<String, _>("id"), row.get::<String, _>("path")))
            .collect())
    }

    async fn submit_batch(&self, scope: &SyncScope, actions: &[BatchAction]) -> Result<Vec<ItemOutcome>> {
        let site = site_key(scope);
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(index_err)?;
        let mut outcomes = Vec::with_capacity(actions.len());

        for action in actions {
            let result = match action {
                BatchAction::Upload(doc) => upsert_document(&mut tx, site, doc, now).await.map(|_| true),
                BatchAction::Merge { id, path } => sqlx::query("UPDATE documents SET path = ? WHERE site = ? AND id = ?")
                    .bind(path)
                    .bind(site)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map(|r| r.rows_affected() > 0),
                // Deleting an absent document is not an error.
                BatchAction::Delete { id } => delete_document(&mut tx, site, id).await.map(|_| true),
            };
            outcomes.push(match result {
                Ok(true) => ItemOutcome::ok(action.id()),
                Ok(false) => ItemOutcome::failed(action.id(), "document not found"),
                Err(e) => ItemOutcome::failed(action.id(), e.to_string()),
            });
        }

        tx.commit().await.map_err(index_err)?;
        debug!(site, actions = actions.len(), "batch committed");
        Ok(outcomes)
    }

    async fn delete_many(&self, scope: &SyncScope, ids: &[String]) -> Result<usize> {
        let site = site_key(scope);
        let mut tx = self.pool.begin().await.map_err(index_err)?;
        let mut removed = 0;
        for id in ids {
            if delete_document(&mut tx, site, id).await.map_err(index_err)? {
                removed += 1;
            }
        }
        tx.commit().await.map_err(index_err)?;
        Ok(removed)
    }
}
