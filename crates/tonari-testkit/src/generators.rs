//! Seeded random space generators.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tonari_space::{VectorMetric, VectorSpace};

/// `n` points drawn uniformly from the unit cube in `dim` dimensions.
pub fn uniform_points(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

/// A Euclidean space over [`uniform_points`].
pub fn uniform_space(n: usize, dim: usize, seed: u64) -> VectorSpace {
    VectorSpace::new(uniform_points(n, dim, seed), VectorMetric::Euclidean)
}

/// A Euclidean space of `clusters` Gaussian-ish blobs with `per_cluster`
/// points each. Cluster centres sit on the unit cube scaled by 10; points
/// scatter around their centre by at most `spread`.
///
/// Point ids are grouped by cluster: points `c * per_cluster ..
/// (c+1) * per_cluster` belong to cluster `c`.
pub fn clustered_space(
    clusters: usize,
    per_cluster: usize,
    dim: usize,
    spread: f32,
    seed: u64,
) -> VectorSpace {
    let mut rng = SmallRng::seed_from_u64(seed);

    let centres: Vec<Vec<f32>> = (0..clusters)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>() * 10.0).collect())
        .collect();

    let mut vectors = Vec::with_capacity(clusters * per_cluster);
    for centre in &centres {
        for _ in 0..per_cluster {
            vectors.push(
                centre
                    .iter()
                    .map(|&c| c + (rng.gen::<f32>() - 0.5) * 2.0 * spread)
                    .collect(),
            );
        }
    }

    VectorSpace::new(vectors, VectorMetric::Euclidean)
}
