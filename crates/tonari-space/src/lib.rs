//! Metric space abstraction for tonari.
//!
//! A [`MetricSpace`] is an opaque, densely-indexed collection of points with
//! a pairwise distance. Everything else in tonari — the k-NN graph builder,
//! the greedy search, the brute-force baseline — only sees this interface.
//!
//! The crate also provides:
//!
//! - [`SpaceIndex`]: the contract every searchable index implements
//! - [`SearchOptions`]: cancellation, point filtering, and the epsilon
//!   recall/cost knob
//! - [`BruteForceIndex`]: exact linear-scan search, used as the oracle in
//!   tests and as a baseline for small spaces
//! - [`VectorSpace`]: dense `f32` vectors under Euclidean or angular
//!   distance
//!
//! # Example
//!
//! ```
//! use tonari_space::{
//!     BruteForceIndex, MetricSpace, SearchOptions, SpaceIndex, VectorMetric, VectorSpace,
//! };
//!
//! let space = VectorSpace::new(
//!     vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]],
//!     VectorMetric::Euclidean,
//! );
//! let index = BruteForceIndex::new(space);
//!
//! let target = index.at(0);
//! let hits = index.nearest(&target, 2, &SearchOptions::default()).unwrap();
//! assert_eq!(hits[0].index, 0);
//! assert_eq!(hits[1].index, 1);
//! ```

mod brute;
mod options;
mod space;
mod stats;
mod vector;

pub use brute::BruteForceIndex;
pub use options::{Cancellation, PointFilter, SearchOptions};
pub use space::{
    compute_distances, search_all, MetricSpace, PointDistance, ResultHeap, SpaceIndex,
};
pub use stats::{argmax_by, mean, variance};
pub use vector::{VectorMetric, VectorSpace};

/// Error type for space and index operations.
#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index format error: {0}")]
    Format(String),
}

/// Result type for space and index operations.
pub type Result<T> = std::result::Result<T, SpaceError>;
