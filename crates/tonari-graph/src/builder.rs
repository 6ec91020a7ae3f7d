//! Parallel NN-descent graph construction.

use crate::heap::{Edge, EdgeHeap};
use crate::pivots::{seed_order, seed_window};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tonari_space::MetricSpace;

/// Build parameters for [`crate::GraphIndex`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Per-node neighbour count during descent. The undirected closure may
    /// grow heaps up to `2k`. Default: 20.
    pub k: usize,

    /// Upper bound on the pair-memoisation set. When the set outgrows the
    /// cap it is cleared; dropped pairs cost at most one redundant distance
    /// computation each. Default: 1,000,000.
    pub checked_capacity: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            k: 20,
            checked_capacity: 1_000_000,
        }
    }
}

/// Shared mutable state of an in-progress build.
///
/// Each node's heap sits behind its own mutex; `connect` locks the two
/// endpoint heaps one at a time, never together, so no lock order exists to
/// violate. The checked set memoises pairs already admitted this iteration
/// behind a reader-writer lock taken after any heap lock, and only when a
/// heap changed.
pub(crate) struct GraphBuilder<'a, S: MetricSpace> {
    space: &'a S,
    heaps: Vec<Mutex<EdgeHeap>>,
    checked: RwLock<HashSet<(u32, u32)>>,
    checked_capacity: usize,
}

/// Unordered pair key.
fn pair(a: usize, b: usize) -> (u32, u32) {
    if a < b {
        (a as u32, b as u32)
    } else {
        (b as u32, a as u32)
    }
}

impl<'a, S: MetricSpace> GraphBuilder<'a, S> {
    pub(crate) fn new(space: &'a S, config: &BuildConfig) -> Self {
        let n = space.len();
        Self {
            space,
            heaps: (0..n).map(|_| Mutex::new(EdgeHeap::new())).collect(),
            checked: RwLock::new(HashSet::new()),
            checked_capacity: config.checked_capacity,
        }
    }

    /// Runs the full pipeline and returns the finished neighbour lists.
    pub(crate) fn run(self, k: usize) -> Vec<Vec<Edge>> {
        let n = self.space.len();

        if n > 1 && k > 0 {
            self.seed_with_pivots(k);
            self.randomize(k);

            let mut iteration = 1usize;
            loop {
                let admitted = self.descent_step(k, k);
                tracing::debug!(iteration, admitted, "descent step");
                if admitted == 0 {
                    break;
                }
                iteration += 1;
            }

            self.make_undirected(2 * k);
        }

        self.heaps
            .into_iter()
            .map(|heap| heap.into_inner().into_edges())
            .collect()
    }

    /// Seeds heaps along the pivot-rank ordering: each rank position is
    /// connected to the `k + 1` ranks around it. Shuffled dispatch keeps
    /// workers from hammering neighbouring heap locks in lockstep.
    fn seed_with_pivots(&self, k: usize) {
        let n = self.space.len();
        let order = seed_order(self.space);

        tonari_exec::shuffled_fork_loop(n, |i| {
            let u = order[i];
            for j in seed_window(i, k, n) {
                if order[j] != u {
                    self.connect(u, order[j], k);
                }
            }
        });
    }

    /// Connects every node to `k` uniformly random other nodes, guarding
    /// connectivity when the pivot seed clusters poorly.
    fn randomize(&self, k: usize) {
        let n = self.space.len();

        tonari_exec::fork_loop(n, |u| {
            let mut rng = rand::thread_rng();
            for _ in 0..k {
                let v = loop {
                    let v = rng.gen_range(0..n);
                    if v != u {
                        break v;
                    }
                };
                self.connect(v, u, k);
            }
        });
    }

    /// One NN-descent iteration. Returns the number of heap admissions;
    /// zero means the graph reached its fixed point.
    pub(crate) fn descent_step(&self, k: usize, max_sample: usize) -> usize {
        let n = self.space.len();

        // Reverse adjacency, carrying each edge's fresh flag. Every existing
        // pair is pre-marked checked so local joins skip edges the graph
        // already holds.
        let mut rev: Vec<Vec<Edge>> = vec![Vec::new(); n];
        {
            let mut checked = self.checked.write();
            checked.clear();
            for u in 0..n {
                let heap = self.heaps[u].lock();
                for e in heap.iter() {
                    rev[e.id as usize].push(Edge {
                        id: u as u32,
                        distance: e.distance,
                        fresh: e.fresh,
                    });
                    checked.insert(pair(u, e.id as usize));
                }
            }
        }

        let admissions = AtomicUsize::new(0);
        let rev = &rev;

        tonari_exec::fork_loop(n, |u| {
            let mut fresh_ids: Vec<usize> = Vec::new();
            let mut settled_ids: Vec<usize> = Vec::new();
            let mut have: HashSet<u32> = HashSet::new();

            {
                let mut heap = self.heaps[u].lock();
                for e in heap.iter_mut() {
                    if e.fresh {
                        fresh_ids.push(e.id as usize);
                        e.fresh = false;
                    } else {
                        settled_ids.push(e.id as usize);
                    }
                    have.insert(e.id);
                }
            }

            // Sample the reverse neighbourhood down to ~max_sample entries.
            // The fresh flags were read outside the owning locks during the
            // reverse scan; the flag is advisory, so the race is benign.
            if !rev[u].is_empty() {
                let odds = max_sample as f64 / rev[u].len() as f64;
                let mut rng = rand::thread_rng();
                for e in &rev[u] {
                    if rng.gen::<f64>() > odds || have.contains(&e.id) {
                        continue;
                    }
                    if e.fresh {
                        fresh_ids.push(e.id as usize);
                    } else {
                        settled_ids.push(e.id as usize);
                    }
                }
            }

            // Local join: fresh x fresh once per unordered pair, and every
            // fresh x settled pair.
            let mut changed = 0;
            for i in 0..fresh_ids.len() {
                let v = fresh_ids[i];
                for &w in &fresh_ids[i + 1..] {
                    changed += self.connect(v, w, k);
                }
                for &w in &settled_ids {
                    if v != w {
                        changed += self.connect(v, w, k);
                    }
                }
            }

            if changed > 0 {
                admissions.fetch_add(changed, Ordering::Relaxed);
            }
        });

        admissions.into_inner()
    }

    /// Attempts to record the true distance between `a` and `b` in both
    /// heaps. Returns how many heaps changed (0, 1, or 2).
    ///
    /// The two endpoint locks are taken one after the other, never nested,
    /// so a concurrent reader may observe one side of the edge before the
    /// other. The admission test is idempotent (an edge to an id already in
    /// the heap is refused), which also makes the duplicate-computation
    /// race on the checked set harmless.
    pub(crate) fn connect(&self, a: usize, b: usize, k: usize) -> usize {
        if a == b {
            return 0;
        }

        let key = pair(a, b);
        {
            let checked = self.checked.read();
            if checked.contains(&key) {
                return 0;
            }
        }

        let distance = self.space.distance(&self.space.at(a), &self.space.at(b));

        let mut changed = 0;
        {
            let mut heap = self.heaps[a].lock();
            if !heap.contains(b as u32) && heap.push_bounded(Edge::fresh(b as u32, distance), k) {
                changed += 1;
            }
        }
        {
            let mut heap = self.heaps[b].lock();
            if !heap.contains(a as u32) && heap.push_bounded(Edge::fresh(a as u32, distance), k) {
                changed += 1;
            }
        }

        if changed != 0 {
            let mut checked = self.checked.write();
            if checked.len() >= self.checked_capacity {
                checked.clear();
            }
            checked.insert(key);
        }

        changed
    }

    /// Adds missing reverse edges, growing heaps up to `bound` entries.
    pub(crate) fn make_undirected(&self, bound: usize) {
        let n = self.space.len();

        // The descent loop has quiesced; snapshot the heaps once instead of
        // juggling pairs of node locks.
        let snapshot: Vec<Vec<Edge>> = self
            .heaps
            .iter()
            .map(|heap| heap.lock().edges().to_vec())
            .collect();

        let mut rev: Vec<EdgeHeap> = (0..n).map(|_| EdgeHeap::new()).collect();
        for (u, edges) in snapshot.iter().enumerate() {
            for e in edges {
                let v = e.id as usize;
                if !snapshot[v].iter().any(|back| back.id as usize == u) {
                    rev[v].push_bounded(Edge::settled(u as u32, e.distance), bound);
                }
            }
        }

        let rev = &rev;
        tonari_exec::fork_loop(n, |u| {
            let mut heap = self.heaps[u].lock();
            for e in rev[u].iter() {
                if !heap.contains(e.id) {
                    heap.push_bounded(*e, bound);
                }
            }
        });
    }

    /// Sum of all edge distances; the quantity the descent loop drives down.
    #[cfg(test)]
    pub(crate) fn total_distance(&self) -> f64 {
        self.heaps
            .iter()
            .map(|heap| heap.lock().iter().map(|e| e.distance).sum::<f64>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonari_space::{VectorMetric, VectorSpace};

    fn random_space(n: usize, dim: usize, seed: u64) -> VectorSpace {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let mut rng = SmallRng::seed_from_u64(seed);
        VectorSpace::new(
            (0..n)
                .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
                .collect(),
            VectorMetric::Euclidean,
        )
    }

    fn check_heap_invariants(builder: &GraphBuilder<'_, VectorSpace>, max_degree: usize) {
        for (u, heap) in builder.heaps.iter().enumerate() {
            let heap = heap.lock();
            assert!(heap.len() <= max_degree, "node {} over degree bound", u);

            let mut seen = HashSet::new();
            for e in heap.iter() {
                assert_ne!(e.id as usize, u, "self-loop at node {}", u);
                assert!(seen.insert(e.id), "duplicate neighbour {} at node {}", e.id, u);
            }

            if let Some(worst) = heap.worst() {
                for e in heap.iter() {
                    assert!(e.distance <= worst.distance);
                }
            }
        }
    }

    #[test]
    fn test_connect_admits_both_sides() {
        let space = random_space(10, 4, 1);
        let builder = GraphBuilder::new(&space, &BuildConfig::default());

        assert_eq!(builder.connect(0, 1, 5), 2);
        assert!(builder.heaps[0].lock().contains(1));
        assert!(builder.heaps[1].lock().contains(0));
    }

    #[test]
    fn test_connect_rejects_self_and_checked_pairs() {
        let space = random_space(10, 4, 2);
        let builder = GraphBuilder::new(&space, &BuildConfig::default());

        assert_eq!(builder.connect(3, 3, 5), 0);

        assert_eq!(builder.connect(0, 1, 5), 2);
        // Same pair in either order is memoised.
        assert_eq!(builder.connect(0, 1, 5), 0);
        assert_eq!(builder.connect(1, 0, 5), 0);
    }

    #[test]
    fn test_connect_never_duplicates_after_checked_clear() {
        let space = random_space(10, 4, 3);
        let config = BuildConfig {
            checked_capacity: 1,
            ..Default::default()
        };
        let builder = GraphBuilder::new(&space, &config);

        builder.connect(0, 1, 5);
        // The cap forces a clear; the pair is forgotten but the heaps must
        // still refuse the duplicate edge.
        builder.connect(0, 2, 5);
        assert_eq!(builder.connect(0, 1, 5), 0);

        check_heap_invariants(&builder, 5);
    }

    #[test]
    fn test_connect_replaces_worst_when_full() {
        // Points on a line: node 0 at x=0, others at x = id.
        let space = VectorSpace::new(
            (0..8).map(|i| vec![i as f32]).collect(),
            VectorMetric::Euclidean,
        );
        let builder = GraphBuilder::new(&space, &BuildConfig::default());

        // Fill node 0 with the two farthest nodes.
        builder.connect(0, 7, 2);
        builder.connect(0, 6, 2);
        assert_eq!(builder.heaps[0].lock().worst().map(|e| e.id), Some(7));

        // A closer node evicts the worst.
        builder.connect(0, 1, 2);
        let heap = builder.heaps[0].lock();
        assert!(heap.contains(1));
        assert!(!heap.contains(7));
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn test_randomize_fills_heaps() {
        let space = random_space(50, 4, 4);
        let builder = GraphBuilder::new(&space, &BuildConfig::default());
        builder.randomize(8);

        for (u, heap) in builder.heaps.iter().enumerate() {
            assert!(!heap.lock().is_empty(), "node {} has no edges", u);
        }
        check_heap_invariants(&builder, 8);
    }

    #[test]
    fn test_descent_reaches_fixed_point() {
        let space = random_space(120, 8, 5);
        let builder = GraphBuilder::new(&space, &BuildConfig::default());
        let k = 6;

        builder.seed_with_pivots(k);
        builder.randomize(k);

        let mut iterations = 0;
        loop {
            let admitted = builder.descent_step(k, k);
            iterations += 1;
            assert!(iterations < 200, "descent failed to converge");
            if admitted == 0 {
                break;
            }
        }

        // A converged graph admits nothing on a further step.
        assert_eq!(builder.descent_step(k, k), 0);
        check_heap_invariants(&builder, k);
    }

    #[test]
    fn test_descent_monotonically_improves() {
        let space = random_space(100, 8, 6);
        let builder = GraphBuilder::new(&space, &BuildConfig::default());
        let k = 5;

        builder.seed_with_pivots(k);
        builder.randomize(k);
        // The sum of heap distances only shrinks once every heap is full;
        // below capacity an admission adds an edge instead of replacing a
        // worse one. Top up until full.
        for _ in 0..20 {
            if builder.heaps.iter().all(|h| h.lock().len() == k) {
                break;
            }
            builder.randomize(k);
        }
        assert!(builder.heaps.iter().all(|h| h.lock().len() == k));

        let mut previous = builder.total_distance();

        for _ in 0..50 {
            let admitted = builder.descent_step(k, k);
            let current = builder.total_distance();
            assert!(
                current <= previous + 1e-9,
                "total distance increased: {} -> {}",
                previous,
                current
            );
            previous = current;
            if admitted == 0 {
                break;
            }
        }
    }

    #[test]
    fn test_make_undirected_reciprocity() {
        let space = random_space(80, 6, 7);
        let builder = GraphBuilder::new(&space, &BuildConfig::default());
        let k = 4;

        builder.randomize(k);
        loop {
            if builder.descent_step(k, k) == 0 {
                break;
            }
        }
        builder.make_undirected(2 * k);

        check_heap_invariants(&builder, 2 * k);

        let lists: Vec<Vec<u32>> = builder
            .heaps
            .iter()
            .map(|h| h.lock().iter().map(|e| e.id).collect())
            .collect();

        for (u, list) in lists.iter().enumerate() {
            for &v in list {
                let back = &lists[v as usize];
                if back.len() < 2 * k {
                    assert!(
                        back.contains(&(u as u32)),
                        "edge {}->{} has no reverse despite slack",
                        u,
                        v
                    );
                }
            }
        }
    }

    #[test]
    fn test_fresh_flags_cleared_by_descent() {
        let space = random_space(30, 4, 8);
        let builder = GraphBuilder::new(&space, &BuildConfig::default());
        let k = 4;

        builder.randomize(k);
        assert!(builder.heaps.iter().any(|h| h.lock().iter().any(|e| e.fresh)));

        loop {
            if builder.descent_step(k, k) == 0 {
                break;
            }
        }

        // At the fixed point nothing was admitted, so nothing is fresh.
        for heap in &builder.heaps {
            assert!(heap.lock().iter().all(|e| !e.fresh));
        }
    }
}
