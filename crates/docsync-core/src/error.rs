//! Error taxonomy for reconciliation runs.

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// A single action the index store refused within an accepted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Identity (content hash) of the rejected document.
    pub id: String,
    /// Reason reported by the store.
    pub message: String,
}

/// Errors surfaced by a reconciliation run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network, rate-limit, or timeout failure talking to the source
    /// provider or the index store. The whole run may be retried.
    #[error("transient failure during {operation}: {message}")]
    TransientFetch {
        /// What was being attempted (e.g. `"list docs/guides"`).
        operation: String,
        /// Underlying error text.
        message: String,
    },

    /// Unknown tenant/site, missing root, or malformed filter.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// The store accepted the batch but rejected some of its items.
    #[error("index rejected {} item(s) ({} applied): {}", failed.len(), applied, failed_ids(failed))]
    PartialIndexFailure {
        /// Number of actions the store applied.
        applied: usize,
        /// The rejected identities.
        failed: Vec<ItemFailure>,
    },

    /// Permanent source provider failure (authentication, malformed response).
    #[error("source error: {0}")]
    Source(String),

    /// Index store failure, reported as-is.
    #[error("index error: {0}")]
    Index(String),
}

fn failed_ids(failed: &[ItemFailure]) -> String {
    failed
        .iter()
        .map(|f| f.id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl SyncError {
    pub fn transient(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::TransientFetch {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Whether rerunning the whole reconciliation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_lists_ids() {
        let err = SyncError::PartialIndexFailure {
            applied: 3,
            failed: vec![
                ItemFailure {
                    id: "a1".to_string(),
                    message: "not found".to_string(),
                },
                ItemFailure {
                    id: "b2".to_string(),
                    message: "too large".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 item(s)"));
        assert!(msg.contains("3 applied"));
        assert!(msg.contains("a1, b2"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_helper() {
        let err = SyncError::transient("list docs", "timed out");
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "transient failure during list docs: timed out");
    }
}
