//! Pivot selection, rank-vector hashing, and pivot-derived distance bounds.
//!
//! A pivot is a reference point with a precomputed distance to every point
//! in the space. With the triangle inequality, a pair's true distance is
//! bracketed per pivot by `|d(p,u) - d(p,v)|` below and `d(p,u) + d(p,v)`
//! above; a handful of well-spread pivots makes those brackets tight enough
//! to use as a cheap filter.
//!
//! Sorting the pivots by distance to a point yields its *hash*: a rank
//! vector that acts as a locality signature. Points whose hashes compare
//! close lexicographically tend to be close in the metric, which is what
//! the graph builder's seeding stage exploits.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use tonari_space::{
    argmax_by, compute_distances, variance, MetricSpace, PointDistance, SearchOptions,
};

/// A reference point with its full distance vector.
#[derive(Debug, Clone)]
pub struct Pivot {
    /// Id of the pivot point in the space.
    pub index: usize,
    /// `distances[i]` is the metric distance from this pivot to point `i`.
    pub distances: Vec<f64>,
    /// Population variance of the distance vector.
    pub variance: f64,
}

/// An ordered set of pivots over one space.
#[derive(Debug, Clone)]
pub struct Pivots {
    pivots: Vec<Pivot>,
}

impl Pivots {
    /// Chooses `max(3, ceil(log2 N))` pivots, clamped to the space size.
    pub fn choose<S: MetricSpace>(space: &S) -> Self {
        let p = ((space.len() as f64).log2().ceil() as usize).max(3);
        Self::choose_k(space, p)
    }

    /// Chooses `p` pivots.
    ///
    /// A random seed point is measured first and discarded; the first two
    /// kept pivots are chosen by an argmax chain (farthest from the seed,
    /// then farthest from that pivot), spreading them across the space.
    /// Each remaining pivot is the unchosen point with the least variance
    /// in its distances to the pivots so far, i.e. the most centrally
    /// positioned one. Points at infinite distance are never picked as far
    /// points.
    pub fn choose_k<S: MetricSpace>(space: &S, p: usize) -> Self {
        let n = space.len();
        let p = p.min(n);

        let mut pivots: Vec<Pivot> = Vec::new();
        if p == 0 {
            return Self { pivots };
        }

        let mut have: HashSet<usize> = HashSet::new();

        let measure = |idx: usize| {
            let distances = compute_distances(space, &space.at(idx));
            let variance = variance(&distances);
            Pivot {
                index: idx,
                distances,
                variance,
            }
        };

        let seed = rand::thread_rng().gen_range(0..n);
        pivots.push(measure(seed));
        have.insert(seed);

        // Two far points, each farthest from the previously measured pivot.
        for j in 0..2 {
            let pick = argmax_by(n, |i| {
                let d = pivots[j].distances[i];
                if d.is_infinite() {
                    -1.0
                } else {
                    d
                }
            });
            if let Some(pick) = pick {
                pivots.push(measure(pick));
                have.insert(pick);
            }
        }

        // The seed only served to find the far points.
        pivots.remove(0);

        while pivots.len() < p {
            let variances = tonari_exec::fork_map(n, |i| {
                let row: Vec<f64> = pivots.iter().map(|pv| pv.distances[i]).collect();
                variance(&row)
            });

            let pick = argmax_by(n, |i| {
                if have.contains(&i) {
                    f64::NEG_INFINITY
                } else {
                    -variances[i]
                }
            });

            match pick {
                Some(pick) => {
                    pivots.push(measure(pick));
                    have.insert(pick);
                }
                None => break,
            }
        }

        pivots.truncate(p);
        Self { pivots }
    }

    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pivot> {
        self.pivots.iter()
    }

    /// The locality signature of point `u`: the permutation of pivot
    /// indices that sorts the pivots by distance to `u` ascending. Ties
    /// keep the lower pivot index first. Hashes compare lexicographically
    /// via the natural `Vec` ordering.
    pub fn hash(&self, u: usize) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.pivots.len() as u32).collect();
        order.sort_by(|&a, &b| {
            self.pivots[a as usize].distances[u].total_cmp(&self.pivots[b as usize].distances[u])
        });
        order
    }

    /// Bounds on the distance between `u` and `v` implied by the pivots.
    ///
    /// Returns `(lower, upper)` with the true distance inside the interval
    /// whenever the space satisfies the triangle inequality. With no
    /// pivots the bounds are vacuous: `(0, +inf)`.
    pub fn approx_distance(&self, u: usize, v: usize) -> (f64, f64) {
        let mut lower = 0.0f64;
        let mut upper = f64::INFINITY;

        for pivot in &self.pivots {
            let du = pivot.distances[u];
            let dv = pivot.distances[v];

            let closest = (du - dv).abs();
            if closest > lower {
                lower = closest;
            }

            let farthest = du + dv;
            if farthest < upper {
                upper = farthest;
            }
        }

        (lower, upper)
    }

    /// All points within `radius` of point `u`, exactly.
    ///
    /// The pivot lower bound prunes candidates before any distance is
    /// computed; survivors are confirmed against the true metric, so the
    /// result is exact regardless of how loose the bounds are.
    pub fn range_query_by_index<S: MetricSpace>(
        &self,
        space: &S,
        u: usize,
        radius: f64,
        options: &SearchOptions<S::Point>,
    ) -> Vec<PointDistance<S::Point>> {
        if self.pivots.is_empty() {
            return Vec::new();
        }

        let results = Mutex::new(Vec::new());
        let upt = space.at(u);

        tonari_exec::fork_loop(space.len(), |v| {
            if v == u {
                return;
            }

            let (lower, _) = self.approx_distance(u, v);
            if lower > radius {
                return;
            }

            let vpt = space.at(v);
            if !options.admits(&vpt) {
                return;
            }

            let distance = space.distance(&upt, &vpt);
            if distance <= radius {
                results.lock().push(PointDistance {
                    index: v,
                    point: vpt,
                    distance,
                });
            }
        });

        let mut results = results.into_inner();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results
    }
}

/// Seeds every node's heap from the pivot-rank ordering.
///
/// Ids are sorted by their pivot hash; each rank position is connected to a
/// window of `k + 1` ranks around it (self excluded). Points with similar
/// rank signatures are likely close in the metric, so this cheap pass gives
/// NN-descent a much better starting point than random edges alone.
pub(crate) fn seed_order<S: MetricSpace>(space: &S) -> Vec<usize> {
    let pivots = Pivots::choose(space);
    let n = space.len();

    if pivots.is_empty() {
        return (0..n).collect();
    }

    let hashes = tonari_exec::fork_map(n, |u| pivots.hash(u));

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| hashes[a].cmp(&hashes[b]));
    order
}

/// The window of rank positions each seed rank connects to.
pub(crate) fn seed_window(i: usize, k: usize, n: usize) -> std::ops::Range<usize> {
    let start = i as isize - (k / 2) as isize;
    let end = start + k as isize + 1;
    let lo = start.clamp(0, n as isize) as usize;
    let hi = end.clamp(0, n as isize) as usize;
    lo..hi
}
