//! Greedy best-first graph search with an epsilon-widened frontier.

use crate::Result;
use parking_lot::Mutex;
use rand::Rng;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use tonari_space::{MetricSpace, PointDistance, ResultHeap, SearchOptions};

/// Read access to a k-NN graph's neighbour lists.
///
/// Both the in-memory [`crate::GraphIndex`] and the mmap-backed
/// [`crate::FrozenGraph`] implement this; the search never needs edge
/// distances, only ids, because the true distance to the target is always
/// recomputed.
pub trait Adjacency: Sync {
    /// Neighbour ids of `node`. Decoding failures surface as errors.
    fn neighbour_ids(&self, node: usize) -> Result<Vec<u32>>;
}

/// A frontier entry ordered by distance, ties by id.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrontierEntry {
    distance: f64,
    id: u32,
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

struct SearchState<P> {
    best: ResultHeap<P>,
    frontier: BinaryHeap<Reverse<FrontierEntry>>,
    checked: HashSet<u32>,
    gthreshold: f64,
}

/// Greedy k-nearest-neighbour query over a built graph.
///
/// Seeds the frontier with random entry points, then expands the closest
/// frontier node until the frontier runs dry or everything left on it is
/// farther than `epsilon * worst_result` while `k` results are already
/// held. Workers poll the cancellation token between expansions; a
/// cancelled search returns the best found so far.
///
/// Filtered-out points never enter the results but are still expanded, so
/// the traversal topology is independent of the filter.
pub fn nearest<S, G>(
    space: &S,
    graph: &G,
    target: &S::Point,
    k: usize,
    options: &SearchOptions<S::Point>,
) -> Result<Vec<PointDistance<S::Point>>>
where
    S: MetricSpace + ?Sized,
    G: Adjacency + ?Sized,
{
    let n = space.len();
    if n == 0 || k == 0 {
        return Ok(Vec::new());
    }

    let state = Mutex::new(SearchState {
        best: ResultHeap::new(),
        frontier: BinaryHeap::new(),
        checked: HashSet::new(),
        gthreshold: f64::INFINITY,
    });

    // Examines one node: computes its true distance, admits it to the
    // results if it qualifies and passes the filter, and always queues it
    // for expansion. Returns false if the node was already examined.
    let consider = |u: usize| -> bool {
        {
            let mut st = state.lock();
            if !st.checked.insert(u as u32) {
                return false;
            }
        }

        // Pure work outside the state lock.
        let point = space.at(u);
        let distance = space.distance(&point, target);
        let admitted = options.admits(&point);

        let mut st = state.lock();
        if admitted && (st.best.len() < k || distance < st.best.worst_distance()) {
            st.best.push_bounded(
                k,
                PointDistance {
                    index: u,
                    point,
                    distance,
                },
            );
            st.gthreshold = options.epsilon * st.best.worst_distance();
        }
        st.frontier.push(Reverse(FrontierEntry {
            distance,
            id: u as u32,
        }));
        true
    };

    // Random entry points; duplicates are re-rolled until enough distinct
    // nodes have been examined.
    let seeds = options.seeds.min(n).max(1);
    let mut rng = rand::thread_rng();
    let mut seeded = 0;
    while seeded < seeds {
        if consider(rng.gen_range(0..n)) {
            seeded += 1;
        }
    }

    let error: Mutex<Option<crate::GraphError>> = Mutex::new(None);

    tonari_exec::fork_while(|| {
        if options.cancellation.is_cancelled() {
            return false;
        }

        let entry = {
            let mut st = state.lock();
            let Some(Reverse(entry)) = st.frontier.pop() else {
                return false;
            };
            if st.best.len() == k && entry.distance > st.gthreshold {
                return false;
            }
            entry
        };

        let ids = match graph.neighbour_ids(entry.id as usize) {
            Ok(ids) => ids,
            Err(e) => {
                error.lock().get_or_insert(e);
                return false;
            }
        };

        for id in ids {
            consider(id as usize);
        }
        true
    });

    if let Some(e) = error.into_inner() {
        return Err(e);
    }

    let st = state.into_inner();
    tracing::trace!(
        visited = st.checked.len(),
        total = n,
        "graph search finished"
    );
    Ok(st.best.into_sorted_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonari_space::{VectorMetric, VectorSpace};

    /// A fully connected toy graph; search over it is exhaustive, which
    /// isolates the search mechanics from build quality.
    struct CompleteGraph {
        n: usize,
    }

    impl Adjacency for CompleteGraph {
        fn neighbour_ids(&self, node: usize) -> Result<Vec<u32>> {
            Ok((0..self.n as u32).filter(|&v| v as usize != node).collect())
        }
    }

    fn line_space(n: usize) -> VectorSpace {
        VectorSpace::new(
            (0..n).map(|i| vec![i as f32]).collect(),
            VectorMetric::Euclidean,
        )
    }

    #[test]
    fn test_exhaustive_search_is_exact() {
        let space = line_space(50);
        let graph = CompleteGraph { n: 50 };
        let target = space.at(20);

        let hits = nearest(&space, &graph, &target, 5, &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].index, 20);
        assert_eq!(hits[0].distance, 0.0);

        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_ties_break_by_descending_id() {
        let space = line_space(9);
        let graph = CompleteGraph { n: 9 };
        // Equidistant from nodes 3 and 5, 2 and 6, ...
        let target: std::sync::Arc<[f32]> = vec![4.0].into();

        let hits = nearest(&space, &graph, &target, 3, &SearchOptions::default()).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(ids, vec![4, 5, 3]);
    }

    #[test]
    fn test_filter_keeps_results_clean() {
        let space = line_space(30);
        let graph = CompleteGraph { n: 30 };
        let target = space.at(0);

        let options =
            SearchOptions::new().with_filter(|pt: &std::sync::Arc<[f32]>| pt[0] as usize % 2 == 0);
        let hits = nearest(&space, &graph, &target, 5, &options).unwrap();

        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.index % 2 == 0));
    }

    #[test]
    fn test_empty_space_and_zero_k() {
        let space = line_space(0);
        let graph = CompleteGraph { n: 0 };
        let target: std::sync::Arc<[f32]> = vec![0.0].into();
        assert!(nearest(&space, &graph, &target, 3, &SearchOptions::default())
            .unwrap()
            .is_empty());

        let space = line_space(5);
        let graph = CompleteGraph { n: 5 };
        let target = space.at(0);
        assert!(nearest(&space, &graph, &target, 0, &SearchOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_adjacency_error_propagates() {
        struct Broken;
        impl Adjacency for Broken {
            fn neighbour_ids(&self, _node: usize) -> Result<Vec<u32>> {
                Err(crate::GraphError::Frozen(
                    tonari_frozen::FrozenError::UnexpectedEof(0),
                ))
            }
        }

        let space = line_space(20);
        let target = space.at(0);
        let err = nearest(&space, &Broken, &target, 3, &SearchOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_k_larger_than_space() {
        let space = line_space(4);
        let graph = CompleteGraph { n: 4 };
        let target = space.at(1);

        let hits = nearest(&space, &graph, &target, 10, &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 4);
    }
}
