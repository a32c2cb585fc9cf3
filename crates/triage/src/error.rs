//! Error types for the triage core.

use std::path::Path;

use thiserror::Error;

/// Errors surfaced by the triage core.
///
/// Remote and local read failures never appear here: they degrade to the next
/// source tier. What remains is the set of failures a caller can act on.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Agent id outside `[a-z0-9_-]`
    #[error("Invalid agent id '{agent}'")]
    InvalidAgent { agent: String },

    /// Every source tier was exhausted for an agent
    #[error("No data available for agent '{agent}'")]
    NoData { agent: String },

    /// A local log could not be written; there is no further fallback
    #[error("Failed to write {path}: {reason}")]
    LocalWrite { path: String, reason: String },

    /// An existing local log could not be parsed
    #[error("Malformed data in {path}: {reason}")]
    MalformedData { path: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Remote store client could not be built
    #[error("Remote store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

impl TriageError {
    pub(crate) fn local_write(path: &Path, reason: impl ToString) -> Self {
        Self::LocalWrite {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(path: &Path, reason: impl ToString) -> Self {
        Self::MalformedData {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for triage operations.
pub type Result<T> = std::result::Result<T, TriageError>;
