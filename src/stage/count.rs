//! Count: job-wide total of path multiplicities.

use std::cmp::Ordering;

use tracing::debug;

use super::{CombineStage, MapContext, MapStage, ReduceContext, ReduceStage};
use crate::config::StageConfiguration;
use crate::counters::Counter;
use crate::execution::{PipelineStep, StageKind};
use crate::extract::ExtractorRegistry;
use crate::model::{Direction, ElementKind, GraphElement, Vertex};
use crate::output::SideEffect;
use crate::{Error, Result};

pub const CLASS: &str = "pipeline.count.class";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountConfig {
    pub kind: ElementKind,
}

impl CountConfig {
    pub fn new(kind: ElementKind) -> Self {
        Self { kind }
    }

    pub fn to_configuration(&self) -> StageConfiguration {
        StageConfiguration::new().with(CLASS, self.kind)
    }

    pub fn from_configuration(conf: &StageConfiguration) -> Result<Self> {
        Ok(Self { kind: conf.require_parsed(CLASS)? })
    }
}

impl From<CountConfig> for PipelineStep {
    fn from(config: CountConfig) -> Self {
        PipelineStep::new(StageKind::Count, config.to_configuration())
    }
}

/// Keeps one running total per task and emits it at cleanup.
pub struct CountMap {
    kind: ElementKind,
    total: u64,
}

impl CountMap {
    fn add(&mut self, element: GraphElement<'_>) -> Result<()> {
        self.total = self
            .total
            .checked_add(element.path_count())
            .ok_or(Error::Overflow { stage: Self::NAME, element: element.micro() })?;
        Ok(())
    }
}

impl MapStage for CountMap {
    const NAME: &'static str = "count";

    type Key = ();
    type Value = u64;

    fn setup(conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        let config = CountConfig::from_configuration(conf)?;
        debug!(kind = %config.kind, "count setup");
        Ok(Self { kind: config.kind, total: 0 })
    }

    fn map(&mut self, vertex: Vertex, ctx: &mut MapContext<'_, (), u64>) -> Result<()> {
        match self.kind {
            ElementKind::Vertex => {
                self.add(GraphElement::from(&vertex))?;
                if vertex.has_paths() {
                    ctx.increment(Counter::VerticesCounted, 1);
                }
            }
            ElementKind::Edge => {
                let mut counted = 0;
                for edge in vertex.edges(Direction::Outgoing).filter(|e| e.has_paths()) {
                    self.add(GraphElement::from(edge))?;
                    counted += 1;
                }
                ctx.increment(Counter::EdgesCounted, counted);
            }
        }
        ctx.write_graph(vertex)
    }

    fn cleanup(&mut self, ctx: &mut MapContext<'_, (), u64>) -> Result<()> {
        ctx.emit((), self.total)
    }
}

fn total(values: Vec<u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

pub struct CountCombine;

impl CombineStage for CountCombine {
    type Key = ();
    type Value = u64;

    fn setup(_conf: &StageConfiguration) -> Result<Self> {
        Ok(Self)
    }

    fn combine(&mut self, _key: &(), values: Vec<u64>) -> Result<Vec<u64>> {
        Ok(vec![total(values)])
    }
}

pub struct CountReduce;

impl ReduceStage for CountReduce {
    const NAME: &'static str = "count";

    type Key = ();
    type Value = u64;

    fn setup(_conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        Ok(Self)
    }

    fn compare_keys(&self, _a: &(), _b: &()) -> Ordering {
        Ordering::Equal
    }

    fn reduce(&mut self, _key: (), values: Vec<u64>, ctx: &mut ReduceContext<'_>) -> Result<()> {
        ctx.write_side_effect(SideEffect::Count { total: total(values) })
    }
}
