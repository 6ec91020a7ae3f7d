//! Exact linear-scan index.

use crate::{
    MetricSpace, PointDistance, Result, ResultHeap, SearchOptions, SpaceIndex,
};
use parking_lot::Mutex;
use std::io::Write;

/// Brute-force nearest-neighbour index.
///
/// Scans the whole space for every query, partitioned across the worker
/// pool with a single mutex around the shared top-k heap. O(n) per query
/// and exact, which makes it the recall oracle for the approximate graph
/// index and a reasonable choice for spaces below a few thousand points.
pub struct BruteForceIndex<S> {
    space: S,
}

impl<S: MetricSpace> BruteForceIndex<S> {
    pub fn new(space: S) -> Self {
        Self { space }
    }

    pub fn space(&self) -> &S {
        &self.space
    }
}

impl<S: MetricSpace> MetricSpace for BruteForceIndex<S> {
    type Point = S::Point;

    fn len(&self) -> usize {
        self.space.len()
    }

    fn at(&self, i: usize) -> Self::Point {
        self.space.at(i)
    }

    fn distance(&self, a: &Self::Point, b: &Self::Point) -> f64 {
        self.space.distance(a, b)
    }
}

impl<S: MetricSpace> SpaceIndex for BruteForceIndex<S> {
    fn nearest(
        &self,
        target: &S::Point,
        k: usize,
        options: &SearchOptions<S::Point>,
    ) -> Result<Vec<PointDistance<S::Point>>> {
        let results = Mutex::new(ResultHeap::new());

        tonari_exec::fork_loop(self.space.len(), |i| {
            if options.cancellation.is_cancelled() {
                return;
            }

            let pt = self.space.at(i);
            if !options.admits(&pt) {
                return;
            }

            let distance = self.space.distance(target, &pt);
            let mut heap = results.lock();
            heap.push_bounded(
                k,
                PointDistance {
                    index: i,
                    point: pt,
                    distance,
                },
            );
        });

        Ok(results.into_inner().into_sorted_vec())
    }

    /// The brute-force index has no persistent form; the space itself is
    /// the index.
    fn write(&self, _w: &mut dyn Write) -> Result<u64> {
        Ok(0)
    }
}
