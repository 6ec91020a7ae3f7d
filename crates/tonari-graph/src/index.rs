//! In-memory graph index.

use crate::builder::{BuildConfig, GraphBuilder};
use crate::heap::Edge;
use crate::search::{self, Adjacency};
use crate::{frozen, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tonari_space::{MetricSpace, PointDistance, SearchOptions, SpaceIndex};

/// An immutable approximate k-NN graph over a metric space.
///
/// Built once with [`GraphIndex::build`], then queried through
/// [`SpaceIndex::nearest`] or serialised with [`SpaceIndex::write`] /
/// [`GraphIndex::save`] into the frozen format read by
/// [`crate::FrozenGraph`].
pub struct GraphIndex<S: MetricSpace> {
    space: S,
    nodes: Vec<Vec<Edge>>,
}

impl<S: MetricSpace> GraphIndex<S> {
    /// Builds the k-NN graph: pivot seeding, random seeding, NN-descent to
    /// a fixed point, then the undirected closure up to degree `2k`.
    ///
    /// A degenerate space (zero or one point) yields a graph with no edges.
    pub fn build(space: S, config: &BuildConfig) -> Self {
        let started = std::time::Instant::now();
        let nodes = GraphBuilder::new(&space, config).run(config.k);
        tracing::debug!(
            nodes = nodes.len(),
            k = config.k,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "graph build finished"
        );

        Self { space, nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The neighbour list of `node`, in heap order.
    pub fn neighbours(&self, node: usize) -> &[Edge] {
        &self.nodes[node]
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    /// Writes the graph as a frozen container to a new file at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let written = frozen::write_graph(&mut writer, &self.nodes)?;
        writer.flush()?;
        Ok(written)
    }
}

impl<S: MetricSpace> Adjacency for GraphIndex<S> {
    fn neighbour_ids(&self, node: usize) -> Result<Vec<u32>> {
        Ok(self.nodes[node].iter().map(|e| e.id).collect())
    }
}

impl<S: MetricSpace> MetricSpace for GraphIndex<S> {
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

impl<S: MetricSpace> SpaceIndex for GraphIndex<S> {
    fn nearest(
        &self,
        target: &S::Point,
        k: usize,
        options: &SearchOptions<S::Point>,
    ) -> tonari_space::Result<Vec<PointDistance<S::Point>>> {
        Ok(search::nearest(&self.space, self, target, k, options)?)
    }

    fn write(&self, w: &mut dyn Write) -> tonari_space::Result<u64> {
        Ok(frozen::write_graph(w, &self.nodes)?)
    }
}
