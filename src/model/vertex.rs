//! Vertex record: the unit a map task consumes and forwards on GRAPH.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{Direction, Edge, PropertyMap, Value};

/// Opaque vertex identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub u64);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Adjacency = SmallVec<[Edge; 2]>;

/// A vertex with its incident edges and its path multiplicity.
///
/// Outgoing edges have `out_vertex == id`, incoming edges `in_vertex == id`.
/// A self-loop appears in both lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub properties: PropertyMap,
    #[serde(default)]
    path_count: u64,
    #[serde(default)]
    out_edges: Adjacency,
    #[serde(default)]
    in_edges: Adjacency,
}

impl Vertex {
    pub fn new(id: VertexId) -> Self {
        Self {
            id,
            properties: PropertyMap::new(),
            path_count: 0,
            out_edges: Adjacency::new(),
            in_edges: Adjacency::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_paths(mut self, paths: u64) -> Self {
        self.path_count = paths;
        self
    }

    pub fn with_out_edge(mut self, edge: Edge) -> Self {
        self.out_edges.push(edge);
        self
    }

    pub fn with_in_edge(mut self, edge: Edge) -> Self {
        self.in_edges.push(edge);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    // ========================================================================
    // Path multiplicity
    // ========================================================================

    pub fn path_count(&self) -> u64 {
        self.path_count
    }

    pub fn has_paths(&self) -> bool {
        self.path_count > 0
    }

    pub fn clear_paths(&mut self) {
        self.path_count = 0;
    }

    pub fn set_paths(&mut self, paths: u64) {
        self.path_count = paths;
    }

    /// Take over the multiplicity of an incident edge.
    ///
    /// With `include` the edge's count is added to this vertex's count,
    /// otherwise it replaces it. The edge itself is left untouched. Returns
    /// the new count, or `None` (count unchanged) if the sum overflows.
    pub fn get_paths(&mut self, edge: &Edge, include: bool) -> Option<u64> {
        let paths = if include {
            self.path_count.checked_add(edge.path_count())?
        } else {
            edge.path_count()
        };
        self.path_count = paths;
        Some(paths)
    }

    // ========================================================================
    // Adjacency
    // ========================================================================

    /// Incident edges in the given direction; `Both` yields outgoing then incoming.
    pub fn edges(&self, dir: Direction) -> impl Iterator<Item = &Edge> {
        let (first, second): (&[Edge], &[Edge]) = match dir {
            Direction::Outgoing => (self.out_edges.as_slice(), &[]),
            Direction::Incoming => (self.in_edges.as_slice(), &[]),
            Direction::Both => (self.out_edges.as_slice(), self.in_edges.as_slice()),
        };
        first.iter().chain(second.iter())
    }

    pub fn edges_mut(&mut self, dir: Direction) -> impl Iterator<Item = &mut Edge> {
        let (first, second): (&mut [Edge], &mut [Edge]) = match dir {
            Direction::Outgoing => (self.out_edges.as_mut_slice(), Default::default()),
            Direction::Incoming => (self.in_edges.as_mut_slice(), Default::default()),
            Direction::Both => (self.out_edges.as_mut_slice(), self.in_edges.as_mut_slice()),
        };
        first.iter_mut().chain(second.iter_mut())
    }

    /// Move the multiplicity of every edge with paths in `dir` onto this
    /// vertex and clear those edges. Returns how many edges were absorbed,
    /// or `None` if the vertex count would overflow.
    pub fn absorb_edge_paths(&mut self, dir: Direction) -> Option<u64> {
        let mut absorbed = 0;
        for side in [Direction::Outgoing, Direction::Incoming] {
            if dir != side && dir != Direction::Both {
                continue;
            }
            let mut edges = std::mem::take(self.side_mut(side));
            let mut overflowed = false;
            for edge in edges.iter_mut().filter(|e| e.has_paths()) {
                if self.get_paths(edge, true).is_none() {
                    overflowed = true;
                    break;
                }
                edge.clear_paths();
                absorbed += 1;
            }
            *self.side_mut(side) = edges;
            if overflowed {
                return None;
            }
        }
        Some(absorbed)
    }

    fn side_mut(&mut self, side: Direction) -> &mut Adjacency {
        match side {
            Direction::Incoming => &mut self.in_edges,
            Direction::Outgoing | Direction::Both => &mut self.out_edges,
        }
    }

    /// Sum of path counts over incident edges in a direction.
    pub fn edge_paths(&self, dir: Direction) -> u64 {
        self.edges(dir).map(Edge::path_count).sum()
    }
}
