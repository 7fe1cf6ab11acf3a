//! Cosine similarity and result ranking shared by every backend.

use crate::error::{IndexError, Result};
use crate::index::SearchResult;

/// Cosine similarity between two equal-length vectors.
///
/// Computes `dot(a, b) / (|a| * |b|)`. If either vector has zero magnitude the
/// result is `0.0`, so a zero vector scores 0 against everything, itself included.
///
/// # Errors
/// [`IndexError::DimensionMismatch`] if the lengths differ.
///
/// # Examples
/// ```rust
/// use behavior_index::similarity::cosine_similarity;
///
/// let s = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
/// assert!(s.abs() < 1e-6);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(IndexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Sort `results` by descending score and keep the first `top_k`.
///
/// The sort is unstable: results with equal scores come back in no particular order.
pub fn rank(mut results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    results.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    results
}

/// Scale `v` to unit length; zero vectors are returned unchanged.
pub(crate) fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}
