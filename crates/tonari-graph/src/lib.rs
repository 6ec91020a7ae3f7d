//! Approximate k-NN graph index over an abstract metric space.
//!
//! The index is built with parallel NN-descent and queried with a greedy
//! best-first graph walk:
//!
//! ```text
//! MetricSpace ──► pivots ──► seed graph ──► NN-descent ──► undirected
//!                                           fixed point     closure
//!                                                              │
//!                      query ◄── greedy epsilon search ◄── GraphIndex
//!                                                              │
//!                                                         frozen file
//!                                                        (mmap, no load)
//! ```
//!
//! Build seeds each node's neighbour heap twice — once from a pivot-rank
//! ordering that places metrically close points near each other, once with
//! uniform random edges for connectivity — then runs local-join refinement
//! until no admission improves any heap. A final closure pass adds missing
//! reverse edges up to twice the build degree.
//!
//! Search keeps a bounded result heap and a distance-ordered frontier; the
//! frontier is widened by an epsilon factor so the walk does not commit to
//! the first local minimum, and can be cancelled at any time, returning the
//! best results found so far.
//!
//! # Example
//!
//! ```
//! use tonari_graph::{BuildConfig, GraphIndex};
//! use tonari_space::{MetricSpace, SearchOptions, SpaceIndex, VectorMetric, VectorSpace};
//!
//! let space = VectorSpace::new(
//!     (0..64).map(|i| vec![i as f32, (i % 8) as f32]).collect(),
//!     VectorMetric::Euclidean,
//! );
//!
//! let index = GraphIndex::build(space, &BuildConfig { k: 8, ..Default::default() });
//! let target = index.at(17);
//! let hits = index.nearest(&target, 3, &SearchOptions::default()).unwrap();
//! assert_eq!(hits[0].index, 17);
//! ```

mod builder;
mod frozen;
mod heap;
mod index;
mod pivots;
mod search;

pub use builder::BuildConfig;
pub use frozen::FrozenGraph;
pub use heap::{Edge, EdgeHeap};
pub use index::GraphIndex;
pub use pivots::{Pivot, Pivots};
pub use search::{nearest, Adjacency};

use tonari_frozen::FrozenError;
use tonari_space::SpaceError;

/// Error type for graph build, search, and serialisation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frozen format error: {0}")]
    Frozen(#[from] FrozenError),

    #[error("graph has {actual} nodes but the space has {expected}")]
    NodeCountMismatch { expected: usize, actual: usize },
}

impl From<GraphError> for SpaceError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Io(e) | GraphError::Frozen(FrozenError::Io(e)) => SpaceError::Io(e),
            other => SpaceError::Format(other.to_string()),
        }
    }
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
