//! Job execution.
//!
//! `LocalExecutor` runs one stage as a job over an in-memory vertex list;
//! `Pipeline` chains stages through GRAPH.

pub mod local;
pub mod pipeline;

pub use local::{JobOutput, LocalExecutor};
pub use pipeline::{Pipeline, PipelineOutput, PipelineStep, StageKind, StageReport};
