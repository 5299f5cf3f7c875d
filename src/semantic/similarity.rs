//! Vector similarity helpers.
//!
//! Cosine similarity between embeddings and a stable top-K selection over
//! scored candidates. Pure functions, no state.

use std::cmp::Ordering;

/// Errors that can occur during vector operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorError {
    #[error("Shape mismatch: expected {expected} dimensions, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

/// A candidate position together with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similar {
    /// Index into the candidate slice
    pub index: usize,
    /// Cosine similarity (-1.0 to 1.0)
    pub similarity: f32,
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`. If either vector has zero magnitude the
/// similarity is defined as `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::ShapeMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

    // rounding can push |x| a hair past 1
    Ok((dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Keep the `k` highest scoring items, best first.
///
/// Equal scores keep their original order. `k == 0` yields an empty list.
pub fn top_k_by<T>(mut items: Vec<T>, k: usize, score: impl Fn(&T) -> f32) -> Vec<T> {
    // sort_by is stable, so ties stay in input order
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(Ordering::Equal)
    });
    items.truncate(k);
    items
}

/// Rank candidates by similarity to `query`, best first.
///
/// Equal similarities keep their original candidate order. Returns at most
/// `k` entries; `k == 0` yields an empty list.
pub fn top_similar<V: AsRef<[f32]>>(
    query: &[f32],
    candidates: &[V],
    k: usize,
) -> Result<Vec<Similar>, VectorError> {
    let results = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            cosine_similarity(query, candidate.as_ref())
                .map(|similarity| Similar { index, similarity })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(top_k_by(results, k, |s| s.similarity))
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
