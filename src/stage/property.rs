//! Property: emit a named property, typed, once per unit of multiplicity.

use tracing::debug;

use super::{MapContext, MapStage};
use crate::config::StageConfiguration;
use crate::counters::Counter;
use crate::execution::{PipelineStep, StageKind};
use crate::extract::ExtractorRegistry;
use crate::model::{Direction, ElementKind, GraphElement, Vertex};
use crate::ordering::{TypedHandler, TypedValue, ValueType};
use crate::output::SideEffect;
use crate::Result;

pub const CLASS: &str = "pipeline.property.class";
pub const KEY: &str = "pipeline.property.key";
pub const TYPE: &str = "pipeline.property.type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyConfig {
    pub kind: ElementKind,
    pub key: String,
    pub value_type: ValueType,
}

impl PropertyConfig {
    pub fn new(kind: ElementKind, key: impl Into<String>, value_type: ValueType) -> Self {
        Self { kind, key: key.into(), value_type }
    }

    pub fn to_configuration(&self) -> StageConfiguration {
        StageConfiguration::new()
            .with(CLASS, self.kind)
            .with(KEY, &self.key)
            .with(TYPE, self.value_type)
    }

    pub fn from_configuration(conf: &StageConfiguration) -> Result<Self> {
        Ok(Self {
            kind: conf.require_parsed(CLASS)?,
            key: conf.require(KEY)?.to_owned(),
            value_type: conf.require_parsed(TYPE)?,
        })
    }
}

impl From<PropertyConfig> for PipelineStep {
    fn from(config: PropertyConfig) -> Self {
        PipelineStep::new(StageKind::Property, config.to_configuration())
    }
}

pub struct PropertyValueMap {
    config: PropertyConfig,
    handler: TypedHandler,
}

impl PropertyValueMap {
    fn collect(&self, element: GraphElement<'_>, out: &mut Vec<(TypedValue, u64)>) -> Result<()> {
        let raw = element.try_pick(&self.config.key, Self::NAME)?;
        let value = self.handler.wrap_for(&raw, Self::NAME, element.micro())?;
        out.push((value, element.path_count()));
        Ok(())
    }
}

impl MapStage for PropertyValueMap {
    const NAME: &'static str = "property";

    type Key = ();
    type Value = ();

    fn setup(conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        let config = PropertyConfig::from_configuration(conf)?;
        debug!(kind = %config.kind, key = %config.key, value_type = %config.value_type, "property setup");
        Ok(Self {
            handler: TypedHandler::new(config.value_type),
            config,
        })
    }

    fn map(&mut self, vertex: Vertex, ctx: &mut MapContext<'_, (), ()>) -> Result<()> {
        let mut values = Vec::new();
        match self.config.kind {
            ElementKind::Vertex => {
                if vertex.has_paths() {
                    self.collect(GraphElement::from(&vertex), &mut values)?;
                    ctx.increment(Counter::VerticesProcessed, 1);
                }
            }
            ElementKind::Edge => {
                for edge in vertex.edges(Direction::Outgoing).filter(|e| e.has_paths()) {
                    self.collect(GraphElement::from(edge), &mut values)?;
                }
                ctx.increment(Counter::OutEdgesProcessed, values.len() as u64);
            }
        }

        ctx.write_graph(vertex)?;
        for (value, paths) in values {
            for _ in 0..paths {
                ctx.write_side_effect(SideEffect::Property { value: value.clone() })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeId, VertexId};
    use crate::output::Outputs;
    use crate::Error;
    use pretty_assertions::assert_eq;

    fn run(config: PropertyConfig, input: Vec<Vertex>) -> Result<(Vec<Vertex>, Vec<SideEffect>)> {
        let mut graph: Vec<Vertex> = Vec::new();
        let mut side: Vec<SideEffect> = Vec::new();
        let mut shuffle: Vec<((), ())> = Vec::new();
        {
            let mut stage = PropertyValueMap::setup(&config.to_configuration(), &ExtractorRegistry::new())?;
            let mut ctx = MapContext::new(Outputs::new(&mut graph, &mut side), &mut shuffle);
            for v in input {
                stage.map(v, &mut ctx)?;
            }
            ctx.finish()?;
        }
        Ok((graph, side))
    }

    #[test]
    fn test_value_repeated_per_path() {
        let config = PropertyConfig::new(ElementKind::Vertex, "name", ValueType::Text);
        let input = vec![
            Vertex::new(VertexId(1)).with_property("name", "marko").with_paths(2),
            Vertex::new(VertexId(2)).with_property("name", "vadas"),
        ];
        let (graph, side) = run(config, input).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(
            side,
            vec![SideEffect::Property { value: TypedValue::Text("marko".into()) }; 2]
        );
    }

    #[test]
    fn test_boolean_property() {
        let config = PropertyConfig::new(ElementKind::Edge, "ok", ValueType::Boolean);
        let v = Vertex::new(VertexId(1)).with_out_edge(
            Edge::new(EdgeId(1), VertexId(1), VertexId(2), "x").with_property("ok", true).with_paths(1),
        );
        let (_, side) = run(config, vec![v]).unwrap();
        assert_eq!(side, vec![SideEffect::Property { value: TypedValue::Boolean(true) }]);
    }

    #[test]
    fn test_missing_numeric_property_is_type_error() {
        let config = PropertyConfig::new(ElementKind::Vertex, "age", ValueType::Int);
        let input = vec![Vertex::new(VertexId(1)).with_paths(1)];
        assert!(matches!(run(config, input), Err(Error::TypeMismatch { stage: "property", .. })));
    }
}
