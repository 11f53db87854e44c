//! # Graph Element Model
//!
//! The records that flow through the pipeline: vertices carrying their
//! incident edges, each element annotated with a path multiplicity.
//!
//! Design rule: this module is pure data with no I/O and no stage logic. Path
//! multiplicity is per-stage state, never a stored property.

pub mod vertex;
pub mod edge;
pub mod element;
pub mod value;
pub mod property_map;

pub use vertex::{Vertex, VertexId};
pub use edge::{Edge, EdgeId, EdgeKey, Direction};
pub use element::{ElementKind, GraphElement, MicroReference, reserved};
pub use value::Value;
pub use property_map::{PropertyMap, properties};
