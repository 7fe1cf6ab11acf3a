//! # Errors
//!
//! One error type, [`IndexError`], is shared by every backend and by the
//! [`TieredIndex`](crate::tiered::TieredIndex) facade.
//!
//! The variants follow the failure classes the index can hit:
//!
//! - **Promotion**: [`IndexError::Construction`] when the approximate backend
//!   cannot be created, [`IndexError::Copy`] when one vector fails to migrate.
//! - **Validation**: [`IndexError::DimensionMismatch`], [`IndexError::EmptyVector`]
//!   and [`IndexError::NonFinite`].
//! - **Persistence**: [`IndexError::Io`] and [`IndexError::Snapshot`].
//! - **Runtime**: [`IndexError::LockPoisoned`] and [`IndexError::Closed`].
//!
//! Removing an absent id and searching with an empty query or `top_k == 0`
//! are **not** errors.

use std::sync::PoisonError;

/// Error type for every index operation.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The approximate backend could not be created.
    #[error("failed to construct approximate index: {reason}")]
    Construction { reason: String },

    /// A single vector failed to migrate during promotion.
    #[error("failed to copy vector {id:?} into approximate index: {source}")]
    Copy {
        id: String,
        #[source]
        source: Box<IndexError>,
    },

    /// Vector length disagrees with the dimensionality the index already holds.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A zero-length vector was offered for storage.
    #[error("vector for {id:?} is empty")]
    EmptyVector { id: String },

    /// A vector holds NaN or infinite components.
    #[error("vector for {id:?} has non-finite components")]
    NonFinite { id: String },

    /// Facade wrapper naming the operation that failed in the active backend.
    #[error("{op} failed: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: Box<IndexError>,
    },

    /// Error reported by the HNSW graph library.
    #[error("graph error: {0}")]
    Graph(&'static str),

    /// Snapshot file is corrupt, unsupported, or could not be encoded.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// A thread panicked while holding one of the index locks.
    #[error("lock poisoned: {resource}")]
    LockPoisoned { resource: &'static str },

    /// The index has been closed.
    #[error("index is closed")]
    Closed,
}

impl IndexError {
    /// Build a [`IndexError::LockPoisoned`] from any [`PoisonError`].
    pub fn poisoned<T>(resource: &'static str, _err: PoisonError<T>) -> Self {
        Self::LockPoisoned { resource }
    }

    /// Wrap an error with the name of the facade operation it came from.
    pub fn in_op(op: &'static str, source: IndexError) -> Self {
        Self::Backend {
            op,
            source: Box::new(source),
        }
    }

    /// Innermost error, looking through [`IndexError::Backend`] and [`IndexError::Copy`].
    pub fn root(&self) -> &IndexError {
        match self {
            Self::Backend { source, .. } | Self::Copy { source, .. } => source.root(),
            other => other,
        }
    }

    /// `true` for errors caused by invalid caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.root(),
            Self::DimensionMismatch { .. } | Self::EmptyVector { .. } | Self::NonFinite { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_looks_through_wrappers() {
        let err = IndexError::in_op(
            "add",
            IndexError::Copy {
                id: "b1".into(),
                source: Box::new(IndexError::DimensionMismatch {
                    expected: 3,
                    actual: 2,
                }),
            },
        );
        assert!(matches!(
            err.root(),
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(err.is_validation());
        assert!(err.to_string().starts_with("add failed"));
    }

    #[test]
    fn test_closed_is_not_validation() {
        assert!(!IndexError::Closed.is_validation());
    }
}
