//! EdgesVertices: move edge multiplicity onto the vertex record.
//!
//! For each selected direction every edge with paths adds its count to the
//! vertex and is cleared. Edges in the other direction are cleared too, so
//! no stale count is forwarded.

use tracing::debug;

use super::{MapContext, MapStage};
use crate::config::StageConfiguration;
use crate::counters::Counter;
use crate::execution::{PipelineStep, StageKind};
use crate::extract::ExtractorRegistry;
use crate::model::{Direction, MicroReference, Vertex};
use crate::{Error, Result};

pub const DIRECTION: &str = "pipeline.edges-vertices.direction";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgesVerticesConfig {
    pub direction: Direction,
}

impl EdgesVerticesConfig {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    pub fn to_configuration(&self) -> StageConfiguration {
        StageConfiguration::new().with(DIRECTION, self.direction)
    }

    pub fn from_configuration(conf: &StageConfiguration) -> Result<Self> {
        Ok(Self { direction: conf.require_parsed(DIRECTION)? })
    }
}

impl From<EdgesVerticesConfig> for PipelineStep {
    fn from(config: EdgesVerticesConfig) -> Self {
        PipelineStep::new(StageKind::EdgesVertices, config.to_configuration())
    }
}

pub struct EdgesVerticesMap {
    direction: Direction,
}

impl MapStage for EdgesVerticesMap {
    const NAME: &'static str = "edges-vertices";

    type Key = ();
    type Value = ();

    fn setup(conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        let config = EdgesVerticesConfig::from_configuration(conf)?;
        debug!(direction = %config.direction, "edges-vertices setup");
        Ok(Self { direction: config.direction })
    }

    fn map(&mut self, mut vertex: Vertex, ctx: &mut MapContext<'_, (), ()>) -> Result<()> {
        if self.direction.includes_incoming() {
            let absorbed = vertex
                .absorb_edge_paths(Direction::Incoming)
                .ok_or(Error::Overflow { stage: Self::NAME, element: MicroReference::Vertex(vertex.id) })?;
            ctx.increment(Counter::InEdgesProcessed, absorbed);
        } else {
            vertex.edges_mut(Direction::Incoming).for_each(|e| e.clear_paths());
        }

        if self.direction.includes_outgoing() {
            let absorbed = vertex
                .absorb_edge_paths(Direction::Outgoing)
                .ok_or(Error::Overflow { stage: Self::NAME, element: MicroReference::Vertex(vertex.id) })?;
            ctx.increment(Counter::OutEdgesProcessed, absorbed);
        } else {
            vertex.edges_mut(Direction::Outgoing).for_each(|e| e.clear_paths());
        }

        ctx.write_graph(vertex)
    }
}
