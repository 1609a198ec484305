//! Schema creation.
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `documents` | One row per indexed document, keyed by `(site, id)` |
//! | `documents_fts` | FTS5 index over `title` and `body` |
//!
//! `id` is the content hash of the source file. Documents without a site
//! are stored under the empty string.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::db;

/// Create the schema. With `reset`, drop the index tables first.
pub async fn run_migrations(config: &Config, reset: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    if reset {
        drop_schema(&pool).await?;
    }
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Safe to run repeatedly.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            site TEXT NOT NULL DEFAULT '',
            id TEXT NOT NULL,
            path TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL,
            indexed_at INTEGER NOT NULL,
            PRIMARY KEY (site, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='documents_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE documents_fts USING fts5(
                site UNINDEXED,
                id UNINDEXED,
                title,
                body
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_site_path ON documents(site, path)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn drop_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS documents_fts")
        .execute(pool)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS documents").execute(pool).await?;
    info!("dropped index tables");
    Ok(())
}
