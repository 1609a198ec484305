//! # docsync
//!
//! Keeps a full-text document index in sync with trees of Markdown files in
//! source repositories (GitHub or a local directory).
//!
//! Each configured site is reconciled by content hash: unchanged files are
//! left alone, renames become path-only merges, edits replace the stale
//! document, and documents whose file disappeared are deleted. The
//! reconciliation algorithm lives in [`docsync_core`]; this crate supplies
//! the providers, the SQLite index, the CLI, and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────┐
//! │  Sources     │──▶│  docsync_core    │──▶│  SQLite   │
//! │ GitHub/Local │   │  reconcile()     │   │  FTS5     │
//! └──────────────┘   └──────────────────┘   └─────┬─────┘
//!                                                 │
//!                             ┌───────────────────┤
//!                             ▼                   ▼
//!                        ┌──────────┐       ┌──────────┐
//!                        │   CLI    │       │   HTTP   │
//!                        │(docsync) │       │  (axum)  │
//!                        └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsync init                     # create database
//! docsync sync handbook            # reconcile one site
//! docsync sync all --force         # rebuild every site
//! docsync search "deployment" --site handbook
//! docsync serve                    # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Local directory source |
//! | [`connector_github`] | GitHub contents API source |
//! | [`filter`] | Glob-based indexability filter |
//! | [`sites`] | Site registry |
//! | [`sqlite_store`] | SQLite index store |
//! | [`ingest`] | Site reconciliation runs |
//! | [`search`] | Full-text search |
//! | [`params`] | HTTP parameter resolution |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod config;
pub mod connector_fs;
pub mod connector_github;
pub mod db;
pub mod filter;
pub mod ingest;
pub mod migrate;
pub mod params;
pub mod search;
pub mod server;
pub mod sites;
pub mod sqlite_store;
