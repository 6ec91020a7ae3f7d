//! Core traits and result types.

use crate::{Result, SearchOptions};
use std::io::Write;
use std::sync::Arc;

/// An opaque collection of points addressed by dense ids `0..len`.
///
/// Distances must be non-negative, symmetric, and zero between a point and
/// itself. The triangle inequality is not required by the graph search, but
/// pivot-derived distance bounds assume it.
///
/// # Thread Safety
///
/// All methods are called concurrently from builder and search workers.
/// A space that lazily materialises points must synchronise internally.
pub trait MetricSpace: Send + Sync {
    /// The point representation handed back to callers. Cheap to clone.
    type Point: Clone + Send + Sync;

    /// Number of points in the space.
    fn len(&self) -> usize;

    /// True if the space has no points.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The point with id `i`. Panics if `i >= len()`.
    fn at(&self, i: usize) -> Self::Point;

    /// Distance between two points.
    fn distance(&self, a: &Self::Point, b: &Self::Point) -> f64;
}

impl<S: MetricSpace> MetricSpace for &S {
    type Point = S::Point;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn at(&self, i: usize) -> Self::Point {
        (**self).at(i)
    }

    fn distance(&self, a: &Self::Point, b: &Self::Point) -> f64 {
        (**self).distance(a, b)
    }
}

impl<S: MetricSpace> MetricSpace for Arc<S> {
    type Point = S::Point;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn at(&self, i: usize) -> Self::Point {
        (**self).at(i)
    }

    fn distance(&self, a: &Self::Point, b: &Self::Point) -> f64 {
        (**self).distance(a, b)
    }
}

/// A search hit: a point, its id, and its distance to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct PointDistance<P> {
    pub index: usize,
    pub point: P,
    pub distance: f64,
}

/// A searchable index over a metric space.
///
/// Implementations are themselves metric spaces (they delegate to the space
/// they index), so indices can be layered and queried interchangeably.
pub trait SpaceIndex: MetricSpace {
    /// Returns up to `k` near neighbours of `target`, sorted by distance
    /// ascending with ties broken by descending id.
    ///
    /// Cancellation is not an error: a cancelled search returns the best
    /// found so far.
    fn nearest(
        &self,
        target: &Self::Point,
        k: usize,
        options: &SearchOptions<Self::Point>,
    ) -> Result<Vec<PointDistance<Self::Point>>>;

    /// Serialises the index, returning the number of bytes written.
    fn write(&self, w: &mut dyn Write) -> Result<u64>;
}

/// Bounded collection of the best `k` point distances seen so far.
///
/// Backed by a binary max-heap with the worst entry at slot 0, so the
/// admission test against the current worst is O(1) and replacement is
/// O(log k).
#[derive(Debug, Clone)]
pub struct ResultHeap<P> {
    entries: Vec<PointDistance<P>>,
}

impl<P> ResultHeap<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distance of the worst entry, or infinity when empty.
    pub fn worst_distance(&self) -> f64 {
        self.entries.first().map_or(f64::INFINITY, |e| e.distance)
    }

    /// Admits `entry` if the heap holds fewer than `k` entries or `entry`
    /// is strictly closer than the current worst, which it then replaces.
    /// Returns true if the heap changed.
    pub fn push_bounded(&mut self, k: usize, entry: PointDistance<P>) -> bool {
        if k == 0 {
            return false;
        }

        if self.entries.len() < k {
            self.entries.push(entry);
            self.sift_up(self.entries.len() - 1);
            true
        } else if entry.distance < self.entries[0].distance {
            self.entries[0] = entry;
            self.sift_down(0);
            true
        } else {
            false
        }
    }

    /// Drains the heap into a vec sorted by distance ascending, ties by
    /// descending id.
    pub fn into_sorted_vec(mut self) -> Vec<PointDistance<P>> {
        self.entries.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(b.index.cmp(&a.index))
        });
        self.entries
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.entries[i].distance <= self.entries[parent].distance {
                break;
            }
            self.entries.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.entries.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut largest = i;

            if left < n && self.entries[left].distance > self.entries[largest].distance {
                largest = left;
            }
            if right < n && self.entries[right].distance > self.entries[largest].distance {
                largest = right;
            }
            if largest == i {
                break;
            }
            self.entries.swap(i, largest);
            i = largest;
        }
    }
}

impl<P> Default for ResultHeap<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the distance from `pt` to every point in the space, in parallel.
pub fn compute_distances<S: MetricSpace>(space: &S, pt: &S::Point) -> Vec<f64> {
    tonari_exec::fork_map(space.len(), |i| space.distance(pt, &space.at(i)))
}

/// Queries several indices in parallel and merges the results into a single
/// top-k list.
pub fn search_all<S: SpaceIndex + ?Sized>(
    target: &S::Point,
    k: usize,
    options: &SearchOptions<S::Point>,
    indices: &[&S],
) -> Result<Vec<PointDistance<S::Point>>> {
    let all = tonari_exec::fork_map(indices.len(), |i| indices[i].nearest(target, k, options));

    let mut results = Vec::new();
    for list in all {
        results.extend(list?);
    }

    results.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(b.index.cmp(&a.index))
    });
    results.truncate(k);
    Ok(results)
}
