//! Transform: evaluate a user function per element and emit its string form
//! once per unit of multiplicity.

use std::sync::Arc;

use tracing::debug;

use super::{MapContext, MapStage};
use crate::config::StageConfiguration;
use crate::counters::Counter;
use crate::execution::{PipelineStep, StageKind};
use crate::extract::{Extractor, ExtractorRegistry, evaluate};
use crate::model::{Direction, ElementKind, GraphElement, Vertex};
use crate::output::SideEffect;
use crate::Result;

pub const CLASS: &str = "pipeline.transform.class";
pub const EXTRACTOR: &str = "pipeline.transform.extractor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub kind: ElementKind,
    pub extractor: String,
}

impl TransformConfig {
    pub fn new(kind: ElementKind, extractor: impl Into<String>) -> Self {
        Self { kind, extractor: extractor.into() }
    }

    pub fn to_configuration(&self) -> StageConfiguration {
        StageConfiguration::new()
            .with(CLASS, self.kind)
            .with(EXTRACTOR, &self.extractor)
    }

    pub fn from_configuration(conf: &StageConfiguration) -> Result<Self> {
        Ok(Self {
            kind: conf.require_parsed(CLASS)?,
            extractor: conf.require(EXTRACTOR)?.to_owned(),
        })
    }
}

impl From<TransformConfig> for PipelineStep {
    fn from(config: TransformConfig) -> Self {
        PipelineStep::new(StageKind::Transform, config.to_configuration())
    }
}

pub struct TransformMap {
    kind: ElementKind,
    function: Arc<dyn Extractor>,
}

impl TransformMap {
    fn apply(&self, element: GraphElement<'_>, ctx: &mut MapContext<'_, (), ()>) -> Result<()> {
        // Null renders as the "null" token.
        let text = evaluate(self.function.as_ref(), element, Self::NAME)?.to_string();
        for _ in 0..element.path_count() {
            ctx.write_side_effect(SideEffect::Text { value: text.clone() })?;
        }
        Ok(())
    }
}

impl MapStage for TransformMap {
    const NAME: &'static str = "transform";

    type Key = ();
    type Value = ();

    fn setup(conf: &StageConfiguration, registry: &ExtractorRegistry) -> Result<Self> {
        let config = TransformConfig::from_configuration(conf)?;
        let function = registry.resolve(EXTRACTOR, &config.extractor)?;
        debug!(kind = %config.kind, extractor = %config.extractor, "transform setup");
        Ok(Self { kind: config.kind, function })
    }

    fn map(&mut self, vertex: Vertex, ctx: &mut MapContext<'_, (), ()>) -> Result<()> {
        match self.kind {
            ElementKind::Vertex => {
                if vertex.has_paths() {
                    self.apply(GraphElement::from(&vertex), ctx)?;
                    ctx.increment(Counter::VerticesProcessed, 1);
                }
            }
            ElementKind::Edge => {
                let mut processed = 0;
                for edge in vertex.edges(Direction::Outgoing).filter(|e| e.has_paths()) {
                    self.apply(GraphElement::from(edge), ctx)?;
                    processed += 1;
                }
                ctx.increment(Counter::EdgesProcessed, processed);
            }
        }
        ctx.write_graph(vertex)
    }
}
