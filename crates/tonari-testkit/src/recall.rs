//! Recall measurement against an exact oracle.

use std::collections::HashSet;
use tonari_space::{Result, SearchOptions, SpaceIndex};

/// Fraction of true `k`-nearest neighbours (as reported by `oracle`) that
/// `index` recovers, averaged over `queries`. Matching is by point id.
pub fn recall_at_k<I, O>(index: &I, oracle: &O, queries: &[I::Point], k: usize) -> Result<f64>
where
    I: SpaceIndex,
    O: SpaceIndex<Point = I::Point>,
{
    if queries.is_empty() || k == 0 {
        return Ok(1.0);
    }

    let mut hits = 0usize;
    let mut wanted = 0usize;

    for query in queries {
        let truth: HashSet<usize> = oracle
            .nearest(query, k, &SearchOptions::default())?
            .into_iter()
            .map(|p| p.index)
            .collect();

        let found: HashSet<usize> = index
            .nearest(query, k, &SearchOptions::default())?
            .into_iter()
            .map(|p| p.index)
            .collect();

        hits += truth.intersection(&found).count();
        wanted += truth.len();
    }

    Ok(hits as f64 / wanted as f64)
}
