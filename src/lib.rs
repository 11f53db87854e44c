//! # graph-pipeline: Path-Multiplicity Graph Analytics Stages
//!
//! Composable map/reduce stages that evaluate traversal-style operations
//! over a stream of vertices (each carrying its incident edges), where every
//! element is annotated with a *path multiplicity*: the number of traversal
//! paths currently ending at it.
//!
//! ## Design Principles
//!
//! 1. **Stage contracts, not an engine**: `MapStage` / `CombineStage` /
//!    `ReduceStage` are the contract with whatever substrate shuffles data
//! 2. **Multiplicity is exact**: filtering clears, never deletes; grouping,
//!    ordering and counting weight every contribution by `path_count()`
//! 3. **Configuration is data**: a `StageConfiguration` is a string bundle
//!    serialized once per job; each task decodes its own private state
//! 4. **No script engine**: user functions are `Extractor`s registered by
//!    name in an `ExtractorRegistry` passed to task setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graph_pipeline::{
//!     ElementKind, ExtractorRegistry, LocalExecutor, Pipeline, PipelineConfig,
//!     Vertex, VertexId,
//! };
//! use graph_pipeline::stage::{GroupCountConfig, IntervalFilterConfig};
//!
//! # fn example() -> graph_pipeline::Result<()> {
//! let input = vec![
//!     Vertex::new(VertexId(1)).with_property("age", 29).with_paths(1),
//!     Vertex::new(VertexId(2)).with_property("age", 12).with_paths(3),
//! ];
//!
//! let pipeline = Pipeline::new()
//!     .step(IntervalFilterConfig::new(ElementKind::Vertex, "age", 18, 65)?)
//!     .step(GroupCountConfig::new(ElementKind::Vertex));
//!
//! let executor = LocalExecutor::new(PipelineConfig::default())?;
//! let output = executor.run_pipeline(&pipeline, &ExtractorRegistry::new(), input)?;
//! for record in &output.stages[1].side_effects {
//!     println!("{record:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Stages
//!
//! | Stage | Phases | GRAPH effect | SIDEEFFECT |
//! |-------|--------|--------------|------------|
//! | Interval filter | map | clears failing elements | |
//! | GroupCount | map, combine, reduce | unchanged | `(key, Σ weight × paths)` |
//! | Order | map, reduce | unchanged | `(label, key)` in key order |
//! | Property | map | unchanged | property value × paths |
//! | Transform | map | unchanged | function result × paths |
//! | EdgesVertices | map | edge paths move onto vertex | |
//! | Count | map, combine, reduce | unchanged | Σ paths |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod ordering;
pub mod aggregate;
pub mod counters;
pub mod output;
pub mod extract;
pub mod stage;
pub mod execution;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Vertex, VertexId, Edge, EdgeId, EdgeKey, Direction,
    ElementKind, GraphElement, MicroReference, Value, PropertyMap,
};

// ============================================================================
// Re-exports: Configuration, ordering, aggregation
// ============================================================================

pub use config::{StageConfiguration, PipelineConfig};
pub use ordering::{ValueType, TypedValue, TypedHandler, SortOrder, KeyComparator};
pub use aggregate::{CounterMap, SpillingCounterMap};
pub use counters::{Counter, Counters};
pub use output::{GroupKey, SideEffect, Record, GraphSink, SideEffectSink, ShuffleSink, JsonLinesSink, Outputs};
pub use extract::{BoxError, Extractor, ExtractorRegistry, PropertyPicker};

// ============================================================================
// Re-exports: Execution
// ============================================================================

pub use execution::{
    LocalExecutor, JobOutput, Pipeline, PipelineStep, PipelineOutput, StageKind, StageReport,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error at '{key}': {message}")]
    Config { key: String, message: String },

    #[error("Type error in {stage} on {element}: expected {expected}, got {got}")]
    TypeMismatch {
        stage: &'static str,
        element: MicroReference,
        expected: String,
        got: String,
    },

    #[error("Evaluation error in {stage} on {element}: {message}")]
    Evaluation {
        stage: &'static str,
        element: MicroReference,
        message: String,
    },

    #[error("Arithmetic overflow in {stage} on {element}")]
    Overflow { stage: &'static str, element: MicroReference },

    #[error("{stage} task {task} failed: {source}")]
    Task {
        stage: &'static str,
        task: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("{stage} task {task} panicked")]
    TaskPanicked { stage: &'static str, task: usize },

    #[error("Output error: {0}")]
    Output(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config { key: key.into(), message: message.into() }
    }

    pub(crate) fn in_task(self, stage: &'static str, task: usize) -> Self {
        match self {
            already @ (Error::Task { .. } | Error::TaskPanicked { .. }) => already,
            other => Error::Task { stage, task, source: Box::new(other) },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
