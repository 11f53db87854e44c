//! Edge in the vertex stream, with its path multiplicity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{PropertyMap, Value, VertexId};

/// Opaque edge identifier; doubles as the relation discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Adjacency direction, relative to the vertex holding the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    /// Outgoing ∪ Incoming.
    Both,
}

impl Direction {
    pub fn includes_outgoing(self) -> bool {
        matches!(self, Direction::Outgoing | Direction::Both)
    }

    pub fn includes_incoming(self) -> bool {
        matches!(self, Direction::Incoming | Direction::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Outgoing => "OUT",
            Direction::Incoming => "IN",
            Direction::Both => "BOTH",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OUT" => Ok(Direction::Outgoing),
            "IN" => Ok(Direction::Incoming),
            "BOTH" => Ok(Direction::Both),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Composite identifier of an edge: `(out-vertex, label, in-vertex, relation)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub out_vertex: VertexId,
    pub label: String,
    pub in_vertex: VertexId,
    pub relation: EdgeId,
}

/// A directed edge as carried in a vertex's adjacency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub out_vertex: VertexId,
    pub in_vertex: VertexId,
    pub label: String,
    pub properties: PropertyMap,
    #[serde(default)]
    path_count: u64,
}

impl Edge {
    pub fn new(id: EdgeId, out_vertex: VertexId, in_vertex: VertexId, label: impl Into<String>) -> Self {
        Self {
            id,
            out_vertex,
            in_vertex,
            label: label.into(),
            properties: PropertyMap::new(),
            path_count: 0,
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

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            out_vertex: self.out_vertex,
            label: self.label.clone(),
            in_vertex: self.in_vertex,
            relation: self.id,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

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

    /// The "other" endpoint of the edge from the given vertex.
    pub fn other_vertex(&self, from: VertexId) -> Option<VertexId> {
        if from == self.out_vertex { Some(self.in_vertex) }
        else if from == self.in_vertex { Some(self.out_vertex) }
        else { None }
    }
}
