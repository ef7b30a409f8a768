//! Similarity ranking — cosine similarity over decoded embedding vectors
//!
//! Pure and exception-free: mismatched dimensionality and zero-norm inputs
//! are defined to score 0 rather than erroring. The caller pre-filters
//! candidates that have no stored embedding at all — "no embedding" is a
//! different condition from "embedding present but dissimilar" and must
//! never reach the scorer.

use serde::{Deserialize, Serialize};

/// Default number of matches returned when the caller gives no limit.
pub const DEFAULT_LIMIT: usize = 5;

/// Hard cap on requested matches.
pub const MAX_LIMIT: usize = 20;

/// A scored candidate; `item` carries whatever metadata the caller attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch<M> {
    pub item: M,
    pub similarity_score: f64,
}

/// Cosine similarity of two vectors, in [-1, 1].
///
/// Accumulates in f64. Length mismatch and zero-norm inputs score 0.0 by
/// contract — this function never panics.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score every candidate against `query`, sort descending and keep `limit`.
///
/// The sort is stable: candidates with exactly equal scores keep their input
/// order. Every candidate passed in is assumed to actually have a vector;
/// exclusion of embedding-less candidates is the caller's pre-filter.
pub fn rank_by_similarity<M>(
    query: &[f32],
    candidates: Vec<(M, Vec<f32>)>,
    limit: usize,
) -> Vec<RankedMatch<M>> {
    let mut ranked: Vec<RankedMatch<M>> = candidates
        .into_iter()
        .map(|(item, vector)| RankedMatch {
            similarity_score: cosine_similarity(query, &vector),
            item,
        })
        .collect();

    // Scores are never NaN (cosine_similarity is total), so the comparator
    // is well-defined; stable sort preserves input order on ties.
    ranked.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

// ============================================================================
// TESTS
// ============================================================================
