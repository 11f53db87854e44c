//! Element class, id-only references and the borrowed element view handed
//! to extractors.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Edge, EdgeId, Value, Vertex, VertexId};
use crate::Error;

/// Reserved property keys that resolve to element metadata instead of a
/// stored property.
pub mod reserved {
    pub const ID: &str = "_id";
    pub const ID_ALIAS: &str = "id";
    /// The element's path multiplicity.
    pub const COUNT: &str = "_count";
    pub const LABEL: &str = "label";
    pub const LABEL_ALIAS: &str = "_label";
    /// String form of an absent value.
    pub const NULL: &str = "null";
}

/// Which element class a stage operates on.
///
/// `Edge` always means the outgoing edges of each vertex record (or, for the
/// interval filter, all incident edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Vertex,
    Edge,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vertex" => Ok(ElementKind::Vertex),
            "edge" => Ok(ElementKind::Edge),
            other => Err(format!("unknown element class '{other}'")),
        }
    }
}

// ============================================================================
// MicroReference
// ============================================================================

/// Id-only stand-in for a vertex or an edge; the default group key.
///
/// Equality is id + kind. Ordering is by id, with kind breaking ties so
/// that `Ord` stays consistent with `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MicroReference {
    Vertex(VertexId),
    Edge(EdgeId),
}

impl MicroReference {
    pub fn id(&self) -> u64 {
        match self {
            MicroReference::Vertex(id) => id.0,
            MicroReference::Edge(id) => id.0,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            MicroReference::Vertex(_) => ElementKind::Vertex,
            MicroReference::Edge(_) => ElementKind::Edge,
        }
    }
}

impl Ord for MicroReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id()).then_with(|| self.kind().cmp(&other.kind()))
    }
}

impl PartialOrd for MicroReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MicroReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MicroReference::Vertex(id) => write!(f, "v[{id}]"),
            MicroReference::Edge(id) => write!(f, "e[{id}]"),
        }
    }
}

// ============================================================================
// GraphElement
// ============================================================================

/// A borrowed vertex or edge, as seen by extractors and property pickers.
#[derive(Debug, Clone, Copy)]
pub enum GraphElement<'a> {
    Vertex(&'a Vertex),
    Edge(&'a Edge),
}

impl<'a> GraphElement<'a> {
    pub fn kind(&self) -> ElementKind {
        match self {
            GraphElement::Vertex(_) => ElementKind::Vertex,
            GraphElement::Edge(_) => ElementKind::Edge,
        }
    }

    pub fn id(&self) -> u64 {
        self.micro().id()
    }

    pub fn micro(&self) -> MicroReference {
        match self {
            GraphElement::Vertex(v) => MicroReference::Vertex(v.id),
            GraphElement::Edge(e) => MicroReference::Edge(e.id),
        }
    }

    pub fn path_count(&self) -> u64 {
        match self {
            GraphElement::Vertex(v) => v.path_count(),
            GraphElement::Edge(e) => e.path_count(),
        }
    }

    pub fn has_paths(&self) -> bool {
        self.path_count() > 0
    }

    /// Stored property, without reserved-key resolution.
    pub fn property(&self, key: &str) -> Option<&'a Value> {
        match *self {
            GraphElement::Vertex(v) => v.get(key),
            GraphElement::Edge(e) => e.get(key),
        }
    }

    /// Resolve a key: reserved keys first, then stored properties.
    /// Absent properties resolve to [`Value::Null`]; a path count past
    /// `i64::MAX` is an overflow charged to `stage`.
    pub fn try_pick(&self, key: &str, stage: &'static str) -> crate::Result<Value> {
        match key {
            reserved::COUNT => i64::try_from(self.path_count())
                .map(Value::Int)
                .map_err(|_| Error::Overflow { stage, element: self.micro() }),
            _ => Ok(self.pick(key)),
        }
    }

    /// [`GraphElement::try_pick`] for callers without a stage. A path count
    /// past `i64::MAX` resolves to [`Value::Null`].
    pub fn pick(&self, key: &str) -> Value {
        match key {
            reserved::ID | reserved::ID_ALIAS => Value::Int(self.id() as i64),
            reserved::COUNT => i64::try_from(self.path_count()).map_or(Value::Null, Value::Int),
            reserved::LABEL | reserved::LABEL_ALIAS => match self {
                GraphElement::Edge(e) => Value::String(e.label.clone()),
                GraphElement::Vertex(v) => v.get(key).cloned().unwrap_or(Value::Null),
            },
            _ => self.property(key).cloned().unwrap_or(Value::Null),
        }
    }

    /// [`GraphElement::try_pick`] rendered as a string (`"null"` when absent).
    pub fn pick_string(&self, key: &str, stage: &'static str) -> crate::Result<String> {
        Ok(self.try_pick(key, stage)?.to_string())
    }
}

impl<'a> From<&'a Vertex> for GraphElement<'a> {
    fn from(v: &'a Vertex) -> Self {
        GraphElement::Vertex(v)
    }
}

impl<'a> From<&'a Edge> for GraphElement<'a> {
    fn from(e: &'a Edge) -> Self {
        GraphElement::Edge(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micro_equality_is_id_and_kind() {
        let v = MicroReference::Vertex(VertexId(3));
        let e = MicroReference::Edge(EdgeId(3));
        assert_ne!(v, e);
        assert_eq!(v, MicroReference::Vertex(VertexId(3)));
        assert_eq!(v.to_string(), "v[3]");
        assert_eq!(e.to_string(), "e[3]");
    }

    #[test]
    fn test_micro_orders_by_id_first() {
        let mut refs = vec![
            MicroReference::Edge(EdgeId(2)),
            MicroReference::Vertex(VertexId(5)),
            MicroReference::Vertex(VertexId(1)),
        ];
        refs.sort();
        let ids: Vec<u64> = refs.iter().map(MicroReference::id).collect();
        assert_eq!(ids, vec![1, 2, 5]);
    }

    #[test]
    fn test_pick_reserved_keys() {
        let v = Vertex::new(VertexId(7)).with_paths(4).with_property("name", "marko");
        let el = GraphElement::from(&v);
        assert_eq!(el.pick(reserved::ID), Value::Int(7));
        assert_eq!(el.pick(reserved::COUNT), Value::Int(4));
        assert_eq!(el.pick("name"), Value::from("marko"));
        assert_eq!(el.pick("missing"), Value::Null);
        assert_eq!(el.pick_string("missing", "test").unwrap(), "null");

        let e = Edge::new(EdgeId(1), VertexId(7), VertexId(8), "knows");
        assert_eq!(GraphElement::from(&e).pick(reserved::LABEL), Value::from("knows"));
    }

    #[test]
    fn test_count_past_i64_is_overflow() {
        let v = Vertex::new(VertexId(2)).with_paths(u64::MAX);
        let el = GraphElement::from(&v);
        assert!(matches!(
            el.try_pick(reserved::COUNT, "order"),
            Err(Error::Overflow { stage: "order", element: MicroReference::Vertex(VertexId(2)) })
        ));
        assert_eq!(el.pick(reserved::COUNT), Value::Null);
        assert_eq!(el.try_pick("name", "order").unwrap(), Value::Null);
    }

    #[test]
    fn test_element_kind_tags() {
        assert_eq!("vertex".parse::<ElementKind>(), Ok(ElementKind::Vertex));
        assert_eq!("edge".parse::<ElementKind>(), Ok(ElementKind::Edge));
        assert!("Vertex.class".parse::<ElementKind>().is_err());
    }
}
