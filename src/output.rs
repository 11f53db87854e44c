//! # Output Multiplexer
//!
//! Every stage writes to two channels:
//!
//! | Channel | Carries | Consumed by |
//! |---------|---------|-------------|
//! | GRAPH | the (possibly mutated) vertex record | the next stage |
//! | SIDEEFFECT | terminal scalars and pairs | the caller, never re-fed |
//!
//! `GraphSink` and `SideEffectSink` are the per-channel writers. `Outputs`
//! bundles one of each for a task and guarantees both are flushed when the
//! task ends, by explicit `close()` or on drop.
//!
//! Map output bound for a reducer goes to a third writer, `ShuffleSink`,
//! owned by whatever substrate moves pairs between tasks.

use std::fmt;
use std::io::Write;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{MicroReference, Value, Vertex};
use crate::ordering::TypedValue;
use crate::{Error, Result};

// ============================================================================
// Records
// ============================================================================

/// A GroupCount key: an extracted value or the element's id reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum GroupKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Text(String),
    Micro(MicroReference),
}

impl From<Value> for GroupKey {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => GroupKey::Null,
            Value::Bool(b) => GroupKey::Bool(b),
            Value::Int(i) => GroupKey::Int(i),
            Value::Float(f) => GroupKey::Float(OrderedFloat(f)),
            Value::String(s) => GroupKey::Text(s),
        }
    }
}

impl From<MicroReference> for GroupKey {
    fn from(micro: MicroReference) -> Self {
        GroupKey::Micro(micro)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Null => f.write_str("null"),
            GroupKey::Bool(b) => write!(f, "{b}"),
            GroupKey::Int(i) => write!(f, "{i}"),
            GroupKey::Float(v) => write!(f, "{}", v.0),
            GroupKey::Text(s) => f.write_str(s),
            GroupKey::Micro(m) => write!(f, "{m}"),
        }
    }
}

/// A terminal SIDEEFFECT emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    /// Job-wide multiplicity total (Count).
    Count { total: u64 },
    /// Summed weight for one group (GroupCount).
    Group { key: GroupKey, count: i64 },
    /// One `(label, key)` pair in sort order (Order).
    Ordered { label: String, key: TypedValue },
    /// One unit of a property value (Property).
    Property { value: TypedValue },
    /// One unit of a function result rendered as text (Transform).
    Text { value: String },
}

/// A record on the wire, tagged with its channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "record", rename_all = "snake_case")]
pub enum Record {
    Graph(Vertex),
    SideEffect(SideEffect),
}

// ============================================================================
// Sinks
// ============================================================================

/// Writer for the GRAPH channel.
pub trait GraphSink: Send {
    fn write_graph(&mut self, vertex: Vertex) -> Result<()>;

    fn flush_graph(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writer for the SIDEEFFECT channel.
pub trait SideEffectSink: Send {
    fn write_side_effect(&mut self, effect: SideEffect) -> Result<()>;

    fn flush_side_effects(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writer for map output bound for the shuffle. Implementations may
/// combine, partition or persist pairs as they arrive.
pub trait ShuffleSink<K, V> {
    fn emit(&mut self, key: K, value: V) -> Result<()>;

    fn flush_shuffle(&mut self) -> Result<()> {
        Ok(())
    }
}

impl GraphSink for Vec<Vertex> {
    fn write_graph(&mut self, vertex: Vertex) -> Result<()> {
        self.push(vertex);
        Ok(())
    }
}

impl SideEffectSink for Vec<SideEffect> {
    fn write_side_effect(&mut self, effect: SideEffect) -> Result<()> {
        self.push(effect);
        Ok(())
    }
}

/// Writes one channel-tagged JSON [`Record`] per line.
///
/// Implements both sink traits. To interleave both channels into one file,
/// build two sinks over `&File`.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> GraphSink for JsonLinesSink<W> {
    fn write_graph(&mut self, vertex: Vertex) -> Result<()> {
        self.write_record(&Record::Graph(vertex))
    }

    fn flush_graph(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}

impl<W: Write + Send> SideEffectSink for JsonLinesSink<W> {
    fn write_side_effect(&mut self, effect: SideEffect) -> Result<()> {
        self.write_record(&Record::SideEffect(effect))
    }

    fn flush_side_effects(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}

impl<K, V> ShuffleSink<K, V> for Vec<(K, V)> {
    fn emit(&mut self, key: K, value: V) -> Result<()> {
        self.push((key, value));
        Ok(())
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// The two channels of one task. Writing after [`Outputs::close`] fails.
pub struct Outputs<'a> {
    graph: &'a mut dyn GraphSink,
    side_effect: &'a mut dyn SideEffectSink,
    graph_written: u64,
    side_effects_written: u64,
    closed: bool,
}

impl<'a> Outputs<'a> {
    pub fn new(graph: &'a mut dyn GraphSink, side_effect: &'a mut dyn SideEffectSink) -> Self {
        Self {
            graph,
            side_effect,
            graph_written: 0,
            side_effects_written: 0,
            closed: false,
        }
    }

    pub fn write_graph(&mut self, vertex: Vertex) -> Result<()> {
        if self.closed {
            return Err(Error::Output(format!("GRAPH write of v[{}] after close", vertex.id)));
        }
        self.graph_written += 1;
        self.graph.write_graph(vertex)
    }

    pub fn write_side_effect(&mut self, effect: SideEffect) -> Result<()> {
        if self.closed {
            return Err(Error::Output("SIDEEFFECT write after close".into()));
        }
        self.side_effects_written += 1;
        self.side_effect.write_side_effect(effect)
    }

    /// Records written so far as `(graph, side_effect)`.
    pub fn written(&self) -> (u64, u64) {
        (self.graph_written, self.side_effects_written)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Flush both channels. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.graph.flush_graph()?;
        self.side_effect.flush_side_effects()
    }
}

impl Drop for Outputs<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!(error = %e, "flushing outputs on drop failed");
            }
        }
    }
}
