//! Full-text search over indexed documents.
//!
//! Uses the `documents_fts` FTS5 table. Scores are BM25 ranks, negated and
//! min-max normalized to `[0, 1]` within a result set so that higher is
//! better. A `*` or empty query matches every document of the requested
//! sites.

use anyhow::{bail, Result};
use docsync_core::error::SyncError;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;

use crate::config::Config;
use crate::db;
use crate::sites;

pub const DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    #[default]
    Score,
    Title,
}

impl FromStr for SearchOrder {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "score" => Ok(SearchOrder::Score),
            "title" => Ok(SearchOrder::Title),
            other => Err(SyncError::InvalidScope(format!(
                "unknown order '{}': use score or title",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub path: String,
    pub site: String,
    pub score: f64,
}

/// Search the documents of `sites`.
///
/// Every site must be configured; otherwise the call fails with
/// [`SyncError::InvalidScope`] before touching the database.
pub async fn search_documents(
    config: &Config,
    pool: &SqlitePool,
    query: &str,
    sites: &[String],
    order: SearchOrder,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    if sites.is_empty() {
        return Err(SyncError::InvalidScope("no sites specified".to_string()).into());
    }
    sites::ensure_known(config, sites)?;
    if limit < 1 {
        return Err(SyncError::InvalidScope("limit must be >= 1".to_string()).into());
    }

    let match_expr = fts_query(query);
    let mut qb: QueryBuilder<Sqlite> = match &match_expr {
        Some(_) => QueryBuilder::new(
            "SELECT d.id, d.title, d.path, d.site, bm25(documents_fts) AS rank \
             FROM documents_fts JOIN documents d ON d.site = documents_fts.site AND d.id = documents_fts.id \
             WHERE documents_fts MATCH ",
        ),
        None => QueryBuilder::new("SELECT d.id, d.title, d.path, d.site, 0.0 AS rank FROM documents d WHERE 1 = 1"),
    };
    if let Some(expr) = &match_expr {
        qb.push_bind(expr.clone());
    }

    qb.push(" AND d.site IN (");
    {
        let mut separated = qb.separated(", ");
        for site in sites {
            separated.push_bind(site.clone());
        }
        separated.push_unseparated(")");
    }

    match order {
        SearchOrder::Score => qb.push(" ORDER BY rank, d.title, d.path"),
        SearchOrder::Title => qb.push(" ORDER BY d.title COLLATE NOCASE, d.path"),
    };
    qb.push(" LIMIT ").push_bind(limit);

    let rows = qb.build().fetch_all(pool).await?;
    let mut hits: Vec<SearchHit> = rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            SearchHit {
                id: row.get("id"),
                title: row.get("title"),
                path: row.get("path"),
                site: row.get("site"),
                score: -rank,
            }
        })
        .collect();

    normalize_scores(&mut hits);
    Ok(hits)
}

/// Turn free text into an FTS5 expression: every word becomes a quoted
/// term, so punctuation in user input cannot break the query syntax.
/// Returns `None` for "match everything".
fn fts_query(query: &str) -> Option<String> {
    let query = query.trim();
    if query.is_empty() || query == "*" {
        return None;
    }
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Min-max normalize scores to `[0, 1]`. A single hit (or all-equal
/// scores) gets `1.0`.
fn normalize_scores(hits: &mut [SearchHit]) {
    if hits.is_empty() {
        return;
    }
    let s_min = hits.iter().map(|h| h.score).fold(f64::INFINITY, f64::min);
    let s_max = hits.iter().map(|h| h.score).fold(f64::NEG_INFINITY, f64::max);
    for hit in hits.iter_mut() {
        hit.score = if (s_max - s_min).abs() < f64::EPSILON {
            1.0
        } else {
            (hit.score - s_min) / (s_max - s_min)
        };
    }
}

/// `docsync search`: print ranked hits.
///
/// With no `--site`, every configured site is searched.
pub async fn run_search(
    config: &Config,
    query: &str,
    sites: Vec<String>,
    order: &str,
    limit: Option<i64>,
) -> Result<()> {
    let order: SearchOrder = order.parse()?;
    let sites = if sites.is_empty() { config.site_names() } else { sites };
    if sites.is_empty() {
        bail!("No sites configured. Add a [sites.<name>] section to the config.");
    }

    let pool = db::connect(config).await?;
    let hits = search_documents(config, &pool, query, &sites, order, limit.unwrap_or(DEFAULT_LIMIT)).await?;
    pool.close().await;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = if hit.title.is_empty() { "(untitled)" } else { hit.title.as_str() };
        println!("{}. [{:.2}] {} / {}", i + 1, hit.score, hit.site, title);
        println!("    path: {}", hit.path);
        println!("    id: {}", hit.id);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f64) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            title: String::new(),
            path: String::new(),
            site: String::new(),
            score,
        }
    }

    #[test]
    fn test_fts_query_quotes_terms() {
        assert_eq!(fts_query("  "), None);
        assert_eq!(fts_query("*"), None);
        assert_eq!(fts_query("--"), None);
        assert_eq!(fts_query("rust cargo"), Some("\"rust\" \"cargo\"".to_string()));
        assert_eq!(fts_query("c++ \"quoted\" AND"), Some("\"c\" \"quoted\" \"AND\"".to_string()));
    }

    #[test]
    fn test_order_parsing() {
        assert_eq!("score".parse::<SearchOrder>().unwrap(), SearchOrder::Score);
        assert_eq!("Title".parse::<SearchOrder>().unwrap(), SearchOrder::Title);
        assert!("date".parse::<SearchOrder>().is_err());
    }

    #[test]
    fn test_normalize_scores() {
        let mut hits = vec![hit("a", 10.0), hit("b", 5.0), hit("c", 0.0)];
        normalize_scores(&mut hits);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!((hits[1].score - 0.5).abs() < 1e-9);
        assert!(hits[2].score.abs() < 1e-9);

        let mut single = vec![hit("a", 3.2)];
        normalize_scores(&mut single);
        assert_eq!(single[0].score, 1.0);
    }
}
