//! GroupCount: `Σ weight × paths` per group key.
//!
//! The map side keeps a spill-guarded counter map, so one key may leave a
//! task as several partial sums; combine and reduce add them back up.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use super::{MapContext, MapStage, CombineStage, ReduceContext, ReduceStage, paths_as_i64};
use crate::aggregate::SpillingCounterMap;
use crate::config::{MAP_SPILL_OVER, PipelineConfig, StageConfiguration};
use crate::counters::Counter;
use crate::execution::{PipelineStep, StageKind};
use crate::extract::{Extractor, ExtractorRegistry, evaluate};
use crate::model::{Direction, ElementKind, GraphElement, Value, Vertex};
use crate::output::{GroupKey, SideEffect};
use crate::{Error, Result};

pub const CLASS: &str = "pipeline.group-count.class";
pub const KEY_EXTRACTOR: &str = "pipeline.group-count.key-extractor";
pub const VALUE_EXTRACTOR: &str = "pipeline.group-count.value-extractor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCountConfig {
    pub kind: ElementKind,
    /// Extractor producing the group key; the element's id reference if unset.
    pub key_extractor: Option<String>,
    /// Extractor producing the weight; 1 if unset.
    pub value_extractor: Option<String>,
    /// Overrides the pipeline-wide spill threshold.
    pub spill_over: Option<usize>,
}

impl GroupCountConfig {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            key_extractor: None,
            value_extractor: None,
            spill_over: None,
        }
    }

    pub fn key_extractor(mut self, name: impl Into<String>) -> Self {
        self.key_extractor = Some(name.into());
        self
    }

    pub fn value_extractor(mut self, name: impl Into<String>) -> Self {
        self.value_extractor = Some(name.into());
        self
    }

    pub fn spill_over(mut self, threshold: usize) -> Self {
        self.spill_over = Some(threshold);
        self
    }

    pub fn to_configuration(&self) -> StageConfiguration {
        let mut conf = StageConfiguration::new().with(CLASS, self.kind);
        if let Some(name) = &self.key_extractor {
            conf.set(KEY_EXTRACTOR, name);
        }
        if let Some(name) = &self.value_extractor {
            conf.set(VALUE_EXTRACTOR, name);
        }
        if let Some(threshold) = self.spill_over {
            conf.set(MAP_SPILL_OVER, threshold);
        }
        conf
    }

    pub fn from_configuration(conf: &StageConfiguration) -> Result<Self> {
        Ok(Self {
            kind: conf.require_parsed(CLASS)?,
            key_extractor: conf.get(KEY_EXTRACTOR).map(str::to_owned),
            value_extractor: conf.get(VALUE_EXTRACTOR).map(str::to_owned),
            spill_over: conf.get_parsed(MAP_SPILL_OVER)?,
        })
    }
}

impl From<GroupCountConfig> for PipelineStep {
    fn from(config: GroupCountConfig) -> Self {
        PipelineStep::new(StageKind::GroupCount, config.to_configuration())
    }
}

// ============================================================================
// Map
// ============================================================================

pub struct GroupCountMap {
    kind: ElementKind,
    key_fn: Option<Arc<dyn Extractor>>,
    value_fn: Option<Arc<dyn Extractor>>,
    counts: SpillingCounterMap<GroupKey>,
}

impl GroupCountMap {
    fn count(&mut self, element: GraphElement<'_>) -> Result<()> {
        let key = match &self.key_fn {
            Some(f) => GroupKey::from(evaluate(f.as_ref(), element, Self::NAME)?),
            None => GroupKey::from(element.micro()),
        };
        let weight = match &self.value_fn {
            Some(f) => weight_of(evaluate(f.as_ref(), element, Self::NAME)?, element)?,
            None => 1,
        };
        let delta = weight
            .checked_mul(paths_as_i64(element, Self::NAME)?)
            .ok_or(Error::Overflow { stage: Self::NAME, element: element.micro() })?;
        self.counts.incr(key, delta);
        Ok(())
    }
}

/// Numbers truncate to i64; anything else is a type error.
fn weight_of(value: Value, element: GraphElement<'_>) -> Result<i64> {
    value.as_int().ok_or_else(|| Error::TypeMismatch {
        stage: GroupCountMap::NAME,
        element: element.micro(),
        expected: "number".into(),
        got: value.type_name().to_owned(),
    })
}

impl MapStage for GroupCountMap {
    const NAME: &'static str = "group-count";

    type Key = GroupKey;
    type Value = i64;

    fn setup(conf: &StageConfiguration, registry: &ExtractorRegistry) -> Result<Self> {
        let config = GroupCountConfig::from_configuration(conf)?;
        let threshold = config.spill_over.unwrap_or(PipelineConfig::default().map_spill_over);
        if threshold == 0 {
            return Err(Error::config(MAP_SPILL_OVER, "must be a positive integer"));
        }
        let key_fn = config
            .key_extractor
            .as_deref()
            .map(|name| registry.resolve(KEY_EXTRACTOR, name))
            .transpose()?;
        let value_fn = config
            .value_extractor
            .as_deref()
            .map(|name| registry.resolve(VALUE_EXTRACTOR, name))
            .transpose()?;
        debug!(kind = %config.kind, threshold, key = ?config.key_extractor, value = ?config.value_extractor, "group-count setup");

        Ok(Self {
            kind: config.kind,
            key_fn,
            value_fn,
            counts: SpillingCounterMap::new(threshold),
        })
    }

    fn map(&mut self, vertex: Vertex, ctx: &mut MapContext<'_, GroupKey, i64>) -> Result<()> {
        match self.kind {
            ElementKind::Vertex => {
                if vertex.has_paths() {
                    self.count(GraphElement::from(&vertex))?;
                    ctx.increment(Counter::VerticesProcessed, 1);
                }
            }
            ElementKind::Edge => {
                let mut processed = 0;
                for edge in vertex.edges(Direction::Outgoing).filter(|e| e.has_paths()) {
                    self.count(GraphElement::from(edge))?;
                    processed += 1;
                }
                ctx.increment(Counter::OutEdgesProcessed, processed);
            }
        }

        self.counts.spill_if_full(|key, count| ctx.emit(key, count))?;

        ctx.write_graph(vertex)
    }

    fn cleanup(&mut self, ctx: &mut MapContext<'_, GroupKey, i64>) -> Result<()> {
        self.counts.flush(|key, count| ctx.emit(key, count))
    }
}

// ============================================================================
// Combine / Reduce
// ============================================================================

fn total(values: Vec<i64>) -> i64 {
    values.into_iter().fold(0, i64::wrapping_add)
}

pub struct GroupCountCombine;

impl CombineStage for GroupCountCombine {
    type Key = GroupKey;
    type Value = i64;

    fn setup(_conf: &StageConfiguration) -> Result<Self> {
        Ok(Self)
    }

    fn combine(&mut self, _key: &GroupKey, values: Vec<i64>) -> Result<Vec<i64>> {
        Ok(vec![total(values)])
    }
}

pub struct GroupCountReduce;

impl ReduceStage for GroupCountReduce {
    const NAME: &'static str = "group-count";

    type Key = GroupKey;
    type Value = i64;

    fn setup(_conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        Ok(Self)
    }

    fn compare_keys(&self, a: &GroupKey, b: &GroupKey) -> Ordering {
        a.cmp(b)
    }

    fn reduce(&mut self, key: GroupKey, values: Vec<i64>, ctx: &mut ReduceContext<'_>) -> Result<()> {
        ctx.write_side_effect(SideEffect::Group { key, count: total(values) })
    }
}
