//! Order: emit `(sort key, label)` pairs so the shuffle sorts them, then
//! re-emit them in key order as `(label, key)`.
//!
//! Multiplicity is preserved in one of two ways. A numeric key is scaled by
//! the element's path count and emitted once; any other key is emitted once
//! per path. Sorting on `_count` itself emits the count once, unscaled.

use std::cmp::Ordering;

use tracing::debug;

use super::{MapContext, MapStage, ReduceContext, ReduceStage};
use crate::config::StageConfiguration;
use crate::counters::Counter;
use crate::execution::{PipelineStep, StageKind};
use crate::extract::ExtractorRegistry;
use crate::model::{Direction, ElementKind, GraphElement, Vertex, reserved};
use crate::ordering::{KeyComparator, SortOrder, TypedHandler, TypedValue, ValueType};
use crate::output::SideEffect;
use crate::{Error, Result};

pub const CLASS: &str = "pipeline.order.class";
pub const KEY: &str = "pipeline.order.key";
pub const TYPE: &str = "pipeline.order.type";
pub const LABEL_KEY: &str = "pipeline.order.label-key";
pub const DIRECTION: &str = "pipeline.order.direction";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfig {
    pub kind: ElementKind,
    /// Property to sort on.
    pub key: String,
    pub value_type: ValueType,
    /// Property whose string form labels each emitted pair.
    pub label_key: String,
    pub order: SortOrder,
}

impl OrderConfig {
    pub fn new(
        kind: ElementKind,
        key: impl Into<String>,
        value_type: ValueType,
        label_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            value_type,
            label_key: label_key.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    /// The shuffle comparator this configuration asks for.
    pub fn comparator(&self) -> Result<KeyComparator> {
        KeyComparator::new(self.value_type, self.order).map_err(|_| {
            Error::config(TYPE, format!("value class '{}' cannot be ordered", self.value_type))
        })
    }

    pub fn to_configuration(&self) -> StageConfiguration {
        StageConfiguration::new()
            .with(CLASS, self.kind)
            .with(KEY, &self.key)
            .with(TYPE, self.value_type)
            .with(LABEL_KEY, &self.label_key)
            .with(DIRECTION, self.order)
    }

    pub fn from_configuration(conf: &StageConfiguration) -> Result<Self> {
        Ok(Self {
            kind: conf.require_parsed(CLASS)?,
            key: conf.require(KEY)?.to_owned(),
            value_type: conf.require_parsed(TYPE)?,
            label_key: conf.require(LABEL_KEY)?.to_owned(),
            order: conf.get_parsed(DIRECTION)?.unwrap_or_default(),
        })
    }
}

impl From<OrderConfig> for PipelineStep {
    fn from(config: OrderConfig) -> Self {
        PipelineStep::new(StageKind::Order, config.to_configuration())
    }
}

pub struct OrderMap {
    config: OrderConfig,
    handler: TypedHandler,
}

impl OrderMap {
    fn emit(&self, element: GraphElement<'_>, ctx: &mut MapContext<'_, TypedValue, String>) -> Result<()> {
        let label = element.pick_string(&self.config.label_key, Self::NAME)?;
        let raw = element.try_pick(&self.config.key, Self::NAME)?;
        let paths = element.path_count();

        if self.config.key == reserved::COUNT {
            ctx.emit(self.handler.wrap_for(&raw, Self::NAME, element.micro())?, label)?;
        } else if raw.is_numeric() {
            let scaled = raw
                .multiply_paths(paths)
                .ok_or(Error::Overflow { stage: Self::NAME, element: element.micro() })?;
            ctx.emit(self.handler.wrap_for(&scaled, Self::NAME, element.micro())?, label)?;
        } else {
            let key = self.handler.wrap_for(&raw, Self::NAME, element.micro())?;
            for _ in 0..paths {
                ctx.emit(key.clone(), label.clone())?;
            }
        }
        Ok(())
    }
}

impl MapStage for OrderMap {
    const NAME: &'static str = "order";

    type Key = TypedValue;
    type Value = String;

    fn setup(conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        let config = OrderConfig::from_configuration(conf)?;
        config.comparator()?;
        debug!(kind = %config.kind, key = %config.key, value_type = %config.value_type, order = %config.order, "order setup");
        Ok(Self {
            handler: TypedHandler::new(config.value_type),
            config,
        })
    }

    fn map(&mut self, vertex: Vertex, ctx: &mut MapContext<'_, TypedValue, String>) -> Result<()> {
        match self.config.kind {
            ElementKind::Vertex => {
                if vertex.has_paths() {
                    self.emit(GraphElement::from(&vertex), ctx)?;
                    ctx.increment(Counter::VerticesProcessed, 1);
                }
            }
            ElementKind::Edge => {
                let mut processed = 0;
                for edge in vertex.edges(Direction::Outgoing).filter(|e| e.has_paths()) {
                    self.emit(GraphElement::from(edge), ctx)?;
                    processed += 1;
                }
                ctx.increment(Counter::OutEdgesProcessed, processed);
            }
        }
        ctx.write_graph(vertex)
    }
}

pub struct OrderReduce {
    comparator: KeyComparator,
}

impl ReduceStage for OrderReduce {
    const NAME: &'static str = "order";
    const TOTAL_ORDER: bool = true;

    type Key = TypedValue;
    type Value = String;

    fn setup(conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        let comparator = OrderConfig::from_configuration(conf)?.comparator()?;
        Ok(Self { comparator })
    }

    fn compare_keys(&self, a: &TypedValue, b: &TypedValue) -> Ordering {
        self.comparator.compare(a, b)
    }

    fn reduce(&mut self, key: TypedValue, labels: Vec<String>, ctx: &mut ReduceContext<'_>) -> Result<()> {
        for label in labels {
            ctx.write_side_effect(SideEffect::Ordered { label, key: key.clone() })?;
        }
        Ok(())
    }
}
