//! Frozen graph serialisation and the mmap-backed reader.
//!
//! The graph freezes as a standard frozen container whose `i`-th payload is
//! node `i`'s neighbour list:
//!
//! ```text
//! varint(len) { zigzag-varint(neighbour_id) varint(f64 bits, swapped) }^len
//! ```
//!
//! Fresh flags are build-time state and are not persisted; every loaded
//! edge is settled.

use crate::heap::Edge;
use crate::search::{self, Adjacency};
use crate::{GraphError, Result};
use std::io::{self, Write};
use std::path::Path;
use tonari_frozen::{
    freeze_items, varint, ByteReader, FrozenDecode, FrozenEncode, FrozenError, FrozenFile,
};
use tonari_space::{MetricSpace, PointDistance, SearchOptions, SpaceIndex};

struct NeighbourListRef<'a>(&'a [Edge]);

impl FrozenEncode for NeighbourListRef<'_> {
    fn encode(&self, w: &mut dyn Write) -> io::Result<u64> {
        let mut n = varint::write_uvarint(w, self.0.len() as u64)?;
        for e in self.0 {
            n += varint::write_ivarint(w, i64::from(e.id))?;
            n += varint::write_f64(w, e.distance)?;
        }
        Ok(n)
    }
}

struct NeighbourList(Vec<Edge>);

impl FrozenDecode for NeighbourList {
    fn decode(r: &mut ByteReader<'_>) -> tonari_frozen::Result<Self> {
        let len = varint::read_uvarint(r)?;
        let len = usize::try_from(len).map_err(|_| {
            FrozenError::InvalidFormat(format!("neighbour count {} too large", len))
        })?;
        // Two bytes minimum per edge; reject counts the stream cannot hold.
        if len > r.remaining() / 2 {
            return Err(FrozenError::UnexpectedEof(r.position()));
        }

        let mut edges = Vec::with_capacity(len);
        for _ in 0..len {
            let id = varint::read_ivarint(r)?;
            let id = u32::try_from(id).map_err(|_| {
                FrozenError::InvalidFormat(format!("neighbour id {} out of range", id))
            })?;
            let distance = varint::read_f64(r)?;
            edges.push(Edge::settled(id, distance));
        }
        Ok(Self(edges))
    }
}

/// Writes all neighbour lists as a frozen container in ascending node
/// order. Returns the number of bytes written.
pub(crate) fn write_graph<W: Write>(w: W, nodes: &[Vec<Edge>]) -> Result<u64> {
    let items: Vec<NeighbourListRef<'_>> = nodes.iter().map(|n| NeighbourListRef(n)).collect();
    Ok(freeze_items(w, &items)?)
}

/// A graph index served directly from a memory-mapped frozen file.
///
/// Opening verifies only that the node count matches the space; neighbour
/// lists decode on demand per query, so there is no load phase and no
/// in-memory copy of the graph.
pub struct FrozenGraph<S: MetricSpace> {
    space: S,
    file: FrozenFile,
}

impl<S: MetricSpace> FrozenGraph<S> {
    /// Memory-maps a frozen graph and pairs it with the space it indexes.
    pub fn open<P: AsRef<Path>>(path: P, space: S) -> Result<Self> {
        let file = FrozenFile::open(path)?;

        let actual = file.count() as usize;
        if actual != space.len() {
            return Err(GraphError::NodeCountMismatch {
                expected: space.len(),
                actual,
            });
        }

        Ok(Self { space, file })
    }

    pub fn node_count(&self) -> usize {
        self.file.count() as usize
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    /// Decodes the neighbour list of `node` from the map.
    pub fn neighbours(&self, node: usize) -> Result<Vec<Edge>> {
        let list: NeighbourList = self.file.get_item(node as u64)?;
        Ok(list.0)
    }
}

impl<S: MetricSpace> Adjacency for FrozenGraph<S> {
    fn neighbour_ids(&self, node: usize) -> Result<Vec<u32>> {
        Ok(self.neighbours(node)?.into_iter().map(|e| e.id).collect())
    }
}

impl<S: MetricSpace> MetricSpace for FrozenGraph<S> {
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

impl<S: MetricSpace> SpaceIndex for FrozenGraph<S> {
    fn nearest(
        &self,
        target: &S::Point,
        k: usize,
        options: &SearchOptions<S::Point>,
    ) -> tonari_space::Result<Vec<PointDistance<S::Point>>> {
        Ok(search::nearest(&self.space, self, target, k, options)?)
    }

    fn write(&self, w: &mut dyn Write) -> tonari_space::Result<u64> {
        let nodes = (0..self.node_count())
            .map(|u| self.neighbours(u))
            .collect::<Result<Vec<_>>>()?;
        Ok(write_graph(w, &nodes)?)
    }
}
