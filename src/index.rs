//! # Index contract
//!
//! The capability every backend exposes. [`ExactIndex`](crate::exact::ExactIndex),
//! [`ApproximateIndex`](crate::approximate::ApproximateIndex) and the
//! [`TieredIndex`](crate::tiered::TieredIndex) facade all implement
//! [`VectorIndex`], so callers can hold any of them as `Arc<dyn VectorIndex>`.
//!
//! Methods take `&self`; implementations guard their state with interior locks.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Caller-assigned key for one stored behavior. Never interpreted, only compared.
pub type BehaviorId = String;

/// One ranked hit: a behavior id and its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: BehaviorId,
    /// Cosine similarity in `[-1, 1]`; higher is more similar.
    pub score: f32,
}

impl SearchResult {
    pub fn new(id: impl Into<BehaviorId>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Nearest-neighbor index over `(BehaviorId, vector)` pairs.
pub trait VectorIndex: Send + Sync {
    /// Store a copy of `vector` under `id`, replacing any previous vector for `id`.
    fn add(&self, id: &str, vector: &[f32]) -> Result<()>;

    /// Drop `id`. Removing an id that is not present succeeds.
    fn remove(&self, id: &str) -> Result<()>;

    /// Up to `top_k` results ordered by descending score.
    ///
    /// An empty `query` or `top_k == 0` yields an empty result, not an error.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Number of distinct ids currently stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist state. A no-op for backends without durable storage.
    fn save(&self) -> Result<()>;

    /// Release resources. Does not imply [`save`](VectorIndex::save).
    fn close(&self) -> Result<()>;
}

/// Reject vectors that cannot be stored in an index of dimensionality `established`.
pub(crate) fn validate_insert(id: &str, vector: &[f32], established: Option<usize>) -> Result<()> {
    if vector.is_empty() {
        return Err(IndexError::EmptyVector { id: id.to_string() });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(IndexError::NonFinite { id: id.to_string() });
    }
    validate_dimension(vector, established)
}

/// Reject vectors whose length disagrees with `established`; any length is fine when `None`.
pub(crate) fn validate_dimension(vector: &[f32], established: Option<usize>) -> Result<()> {
    match established {
        Some(expected) if expected != vector.len() => Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}
