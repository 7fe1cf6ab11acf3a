//! # Exact index
//!
//! Brute-force nearest-neighbor search over an in-memory `id → vector` map.
//! Always correct; `O(n)` per search plus an `O(n log n)` sort, which is fine
//! up to a few thousand vectors. The [`TieredIndex`](crate::tiered::TieredIndex)
//! starts here and promotes to the approximate backend as the map grows.
//!
//! The map sits behind a [`RwLock`]: searches run concurrently, writers are
//! exclusive.
//!
//! ## Quick Example
//! ```rust
//! use behavior_index::exact::ExactIndex;
//! use behavior_index::index::VectorIndex;
//!
//! let idx = ExactIndex::new();
//! idx.add("b1", &[1.0, 0.0, 0.0]).unwrap();
//! idx.add("b2", &[0.0, 1.0, 0.0]).unwrap();
//! let hits = idx.search(&[1.0, 0.0, 0.0], 1).unwrap();
//! assert_eq!(hits[0].id, "b1");
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::error::{IndexError, Result};
use crate::index::{BehaviorId, SearchResult, VectorIndex, validate_dimension, validate_insert};
use crate::similarity::{cosine_similarity, rank};

const RESOURCE: &str = "exact index";

/// Linear-scan index. Stored vectors are copies of what callers pass in.
#[derive(Debug, Default)]
pub struct ExactIndex {
    vectors: RwLock<HashMap<BehaviorId, Vec<f32>>>,
}

impl ExactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of every stored `(id, vector)` pair, in no particular order.
    pub fn entries(&self) -> Result<Vec<(BehaviorId, Vec<f32>)>> {
        let vectors = self
            .vectors
            .read()
            .map_err(|e| IndexError::poisoned(RESOURCE, e))?;
        Ok(vectors
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect())
    }

    /// Dimensionality of the stored vectors, or `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.read_any().values().next().map(Vec::len)
    }

    /// Read access for accessors that cannot report errors. Writers validate
    /// before mutating, so a poisoned map is still consistent.
    fn read_any(&self) -> RwLockReadGuard<'_, HashMap<BehaviorId, Vec<f32>>> {
        self.vectors.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop every stored vector.
    pub fn clear(&self) -> Result<()> {
        self.vectors
            .write()
            .map_err(|e| IndexError::poisoned(RESOURCE, e))?
            .clear();
        Ok(())
    }
}

impl VectorIndex for ExactIndex {
    fn add(&self, id: &str, vector: &[f32]) -> Result<()> {
        let mut vectors = self
            .vectors
            .write()
            .map_err(|e| IndexError::poisoned(RESOURCE, e))?;
        validate_insert(id, vector, vectors.values().next().map(Vec::len))?;
        vectors.insert(id.to_string(), vector.to_vec());
        debug!(id, count = vectors.len(), "exact add");
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        let mut vectors = self
            .vectors
            .write()
            .map_err(|e| IndexError::poisoned(RESOURCE, e))?;
        if vectors.remove(id).is_some() {
            debug!(id, count = vectors.len(), "exact remove");
        }
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let vectors = self
            .vectors
            .read()
            .map_err(|e| IndexError::poisoned(RESOURCE, e))?;
        validate_dimension(query, vectors.values().next().map(Vec::len))?;

        let scored = vectors
            .iter()
            .map(|(id, v)| Ok(SearchResult::new(id.clone(), cosine_similarity(query, v)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(rank(scored, top_k))
    }

    fn len(&self) -> usize {
        self.read_any().len()
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn three_axes() -> ExactIndex {
        let idx = ExactIndex::new();
        idx.add("b1", &[1.0, 0.0, 0.0]).unwrap();
        idx.add("b2", &[0.0, 1.0, 0.0]).unwrap();
        idx.add("b3", &[0.0, 0.0, 1.0]).unwrap();
        idx
    }

    #[test]
    fn test_search_three_axes() {
        let idx = three_axes();
        let hits = idx.search(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "b1");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[1].score.abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
        let mut rest: Vec<&str> = hits[1..].iter().map(|h| h.id.as_str()).collect();
        rest.sort();
        assert_eq!(rest, vec!["b2", "b3"]);
    }

    #[test]
    fn test_search_caps_at_len_and_top_k() {
        let idx = three_axes();
        assert_eq!(idx.search(&[1.0, 1.0, 0.0], 10).unwrap().len(), 3);
        assert_eq!(idx.search(&[1.0, 1.0, 0.0], 2).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_query_and_zero_k_return_nothing() {
        let idx = three_axes();
        assert!(idx.search(&[], 3).unwrap().is_empty());
        assert!(idx.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
        assert!(ExactIndex::new().search(&[1.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_readd_replaces_vector() {
        let idx = three_axes();
        idx.add("b1", &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(idx.len(), 3);
        let hits = idx.search(&[0.0, 1.0, 0.0], 3).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 1.0).abs() < 1e-6);
        let b1 = hits.iter().find(|h| h.id == "b1").unwrap();
        assert!((b1.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stored_vectors_are_copies() {
        let idx = ExactIndex::new();
        let mut v = vec![1.0, 0.0];
        idx.add("a", &v).unwrap();
        v[0] = 0.0;
        v[1] = 1.0;
        let hits = idx.search(&[1.0, 0.0], 1).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let idx = three_axes();
        idx.remove("b2").unwrap();
        idx.remove("b2").unwrap();
        idx.remove("never-added").unwrap();
        assert_eq!(idx.len(), 2);
        assert!(idx.search(&[0.0, 1.0, 0.0], 3).unwrap().iter().all(|h| h.id != "b2"));
    }

    #[test]
    fn test_dimension_is_enforced_until_empty() {
        let idx = ExactIndex::new();
        idx.add("a", &[1.0, 0.0]).unwrap();
        let err = idx.add("b", &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 2, actual: 3 }));
        assert!(idx.search(&[1.0, 0.0, 0.0], 1).unwrap_err().is_validation());

        idx.remove("a").unwrap();
        idx.add("b", &[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(idx.dimension(), Some(3));
    }

    #[test]
    fn test_empty_vector_rejected() {
        let idx = ExactIndex::new();
        assert!(matches!(idx.add("a", &[]).unwrap_err(), IndexError::EmptyVector { .. }));
        assert!(idx.is_empty());
    }

    #[test]
    fn test_non_finite_rejected() {
        let idx = ExactIndex::new();
        idx.add("a", &[1.0, 0.0]).unwrap();
        for bad in [[f32::NAN, 0.0], [0.0, f32::INFINITY], [f32::NEG_INFINITY, 1.0]] {
            let err = idx.add("b", &bad).unwrap_err();
            assert!(matches!(err, IndexError::NonFinite { ref id } if id == "b"));
            assert!(err.is_validation());
        }
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.search(&[1.0, 0.0], 5).unwrap()[0].id, "a");
    }

    #[test]
    fn test_poisoned_lock_still_reports_size() {
        let idx = Arc::new(three_axes());
        let poisoner = Arc::clone(&idx);
        let _ = thread::spawn(move || {
            let _guard = poisoner.vectors.write().unwrap();
            panic!("poison the map");
        })
        .join();

        assert_eq!(idx.len(), 3);
        assert_eq!(idx.dimension(), Some(3));
        assert!(matches!(
            idx.search(&[1.0, 0.0, 0.0], 1).unwrap_err(),
            IndexError::LockPoisoned { .. }
        ));
    }

    #[test]
    fn test_results_strictly_ordered() {
        let idx = ExactIndex::new();
        for i in 0..50 {
            let angle = i as f32 * 0.03;
            idx.add(&format!("v{i}"), &[angle.cos(), angle.sin()]).unwrap();
        }
        let hits = idx.search(&[1.0, 0.0], 20).unwrap();
        assert_eq!(hits.len(), 20);
        assert_eq!(hits[0].id, "v0");
        assert!(hits.windows(2).all(|w| w[0].score > w[1].score));
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let idx = Arc::new(ExactIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let idx = Arc::clone(&idx);
                thread::spawn(move || {
                    for i in 0..100 {
                        let id = format!("t{t}-{i}");
                        idx.add(&id, &[t as f32 + 1.0, i as f32]).unwrap();
                        idx.search(&[1.0, 1.0], 5).unwrap();
                        if i % 2 == 0 {
                            idx.remove(&id).unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(idx.len(), 8 * 50);
    }
}
