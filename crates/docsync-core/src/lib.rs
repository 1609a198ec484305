//! # docsync core
//!
//! Runtime-agnostic logic for docsync: data models, the error taxonomy,
//! document path derivation, content preparation, the reconciliation
//! algorithm, and the source/store traits it runs against.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Providers
//! and stores live in the `docsync` application crate (or in tests).
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │  SourceTree  │   │  IndexStore  │
//! │  enumerate() │   │   query()    │
//! └──────┬───────┘   └──────┬───────┘
//!        │ RepoItem         │ IndexEntry
//!        ▼                  ▼
//!      ┌──────────────────────┐
//!      │      Reconciler      │──▶ fetch + prepare (New / ContentChanged)
//!      └──────────┬───────────┘
//!                 ▼
//!        submit_batch(actions)
//! ```

pub mod error;
pub mod models;
pub mod paths;
pub mod prepare;
pub mod reconcile;
pub mod source;
pub mod store;
pub mod sync;

pub use error::SyncError;
pub use models::{BatchAction, IndexEntry, IndexedDocument, RepoItem};
pub use reconcile::{Classification, Reconciler};
pub use sync::{reconcile, SyncOptions, SyncReport, SyncScope};
