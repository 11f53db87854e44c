//! Pipelines: stages chained through GRAPH.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{JobOutput, LocalExecutor};
use crate::config::StageConfiguration;
use crate::counters::Counters;
use crate::extract::ExtractorRegistry;
use crate::model::Vertex;
use crate::output::SideEffect;
use crate::stage::{
    CountCombine, CountMap, CountReduce, EdgesVerticesMap, GroupCountCombine, GroupCountMap,
    GroupCountReduce, IntervalFilterMap, NoCombine, OrderMap, OrderReduce, PropertyValueMap,
    TransformMap,
};
use crate::ordering::TypedValue;
use crate::Result;

/// Which stage a pipeline step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    IntervalFilter,
    GroupCount,
    Order,
    Property,
    Transform,
    EdgesVertices,
    Count,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::IntervalFilter => "interval-filter",
            StageKind::GroupCount => "group-count",
            StageKind::Order => "order",
            StageKind::Property => "property",
            StageKind::Transform => "transform",
            StageKind::EdgesVertices => "edges-vertices",
            StageKind::Count => "count",
        }
    }

    /// Whether the stage has a reduce phase.
    pub fn has_reduce(self) -> bool {
        matches!(self, StageKind::GroupCount | StageKind::Order | StageKind::Count)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "interval-filter" => Ok(StageKind::IntervalFilter),
            "group-count" => Ok(StageKind::GroupCount),
            "order" => Ok(StageKind::Order),
            "property" => Ok(StageKind::Property),
            "transform" => Ok(StageKind::Transform),
            "edges-vertices" => Ok(StageKind::EdgesVertices),
            "count" => Ok(StageKind::Count),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// One stage invocation: its kind and configuration bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub kind: StageKind,
    pub conf: StageConfiguration,
}

impl PipelineStep {
    pub fn new(kind: StageKind, conf: StageConfiguration) -> Self {
        Self { kind, conf }
    }
}

/// An ordered list of steps. Each step reads the previous step's GRAPH.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: impl Into<PipelineStep>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Side effects and counters of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub kind: StageKind,
    pub side_effects: Vec<SideEffect>,
    pub counters: Counters,
}

/// Final GRAPH plus one report per step.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub graph: Vec<Vertex>,
    pub stages: Vec<StageReport>,
}

impl LocalExecutor {
    /// Run one step as a job of the stage its kind names.
    pub fn run_step(
        &self,
        step: &PipelineStep,
        registry: &ExtractorRegistry,
        input: Vec<Vertex>,
    ) -> Result<JobOutput> {
        let conf = &step.conf;
        match step.kind {
            StageKind::IntervalFilter => self.run_map_only::<IntervalFilterMap>(conf, registry, input),
            StageKind::Property => self.run_map_only::<PropertyValueMap>(conf, registry, input),
            StageKind::Transform => self.run_map_only::<TransformMap>(conf, registry, input),
            StageKind::EdgesVertices => self.run_map_only::<EdgesVerticesMap>(conf, registry, input),
            StageKind::GroupCount => {
                self.run_map_reduce::<GroupCountMap, GroupCountCombine, GroupCountReduce>(conf, registry, input)
            }
            StageKind::Order => {
                self.run_map_reduce::<OrderMap, NoCombine<TypedValue, String>, OrderReduce>(conf, registry, input)
            }
            StageKind::Count => self.run_map_reduce::<CountMap, CountCombine, CountReduce>(conf, registry, input),
        }
    }

    /// Run every step in order, feeding each step's GRAPH into the next.
    pub fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        registry: &ExtractorRegistry,
        input: Vec<Vertex>,
    ) -> Result<PipelineOutput> {
        let mut graph = input;
        let mut stages = Vec::with_capacity(pipeline.len());

        for (index, step) in pipeline.steps.iter().enumerate() {
            let job = self.run_step(step, registry, graph)?;
            info!(
                step = index,
                stage = %step.kind,
                records = job.graph.len(),
                side_effects = job.side_effects.len(),
                "pipeline step finished"
            );
            graph = job.graph;
            stages.push(StageReport {
                kind: step.kind,
                side_effects: job.side_effects,
                counters: job.counters,
            });
        }

        Ok(PipelineOutput { graph, stages })
    }
}
