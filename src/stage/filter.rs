//! Interval filter: clear the paths of elements whose property falls outside
//! `[start, end)`.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::{MapContext, MapStage};
use crate::config::StageConfiguration;
use crate::counters::Counter;
use crate::execution::{PipelineStep, StageKind};
use crate::extract::ExtractorRegistry;
use crate::model::{Direction, ElementKind, GraphElement, Value, Vertex};
use crate::{Error, Result};

pub const CLASS: &str = "pipeline.filter.class";
pub const KEY: &str = "pipeline.filter.key";
pub const START: &str = "pipeline.filter.start";
pub const END: &str = "pipeline.filter.end";
pub const VALUE_CLASS: &str = "pipeline.filter.value-class";

/// Value class the bounds are declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalClass {
    Text,
    Numeric,
    Boolean,
}

impl IntervalClass {
    pub fn as_str(self) -> &'static str {
        match self {
            IntervalClass::Text => "text",
            IntervalClass::Numeric => "numeric",
            IntervalClass::Boolean => "boolean",
        }
    }
}

impl fmt::Display for IntervalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(IntervalClass::Text),
            "numeric" => Ok(IntervalClass::Numeric),
            "boolean" => Ok(IntervalClass::Boolean),
            other => Err(format!("unsupported value class '{other}'")),
        }
    }
}

/// Half-open interval `[start, end)` in one value class.
#[derive(Debug, Clone, PartialEq)]
pub enum Interval {
    Text { start: String, end: String },
    Numeric { start: f64, end: f64 },
    Boolean { start: bool, end: bool },
}

impl Interval {
    /// Build from two bounds; the start bound decides the value class.
    pub fn between(start: Value, end: Value) -> Result<Self> {
        match (start, end) {
            (Value::String(start), Value::String(end)) => Ok(Interval::Text { start, end }),
            (Value::Bool(start), Value::Bool(end)) => Ok(Interval::Boolean { start, end }),
            (start, end) if start.is_numeric() => match (start.as_float(), end.as_float()) {
                (Some(start), Some(end)) => Ok(Interval::Numeric { start, end }),
                _ => Err(Error::config(
                    END,
                    format!("end bound is {}, start is numeric", end.type_name()),
                )),
            },
            (start, end) if matches!(start, Value::String(_) | Value::Bool(_)) => Err(Error::config(
                END,
                format!("end bound is {}, start is {}", end.type_name(), start.type_name()),
            )),
            (start, _) => Err(Error::config(START, format!("unknown value class {}", start.type_name()))),
        }
    }

    pub fn class(&self) -> IntervalClass {
        match self {
            Interval::Text { .. } => IntervalClass::Text,
            Interval::Numeric { .. } => IntervalClass::Numeric,
            Interval::Boolean { .. } => IntervalClass::Boolean,
        }
    }

    /// `Some(start <= value < end)`, `None` when the value is not of the
    /// interval's class.
    pub fn contains(&self, value: &Value) -> Option<bool> {
        match (self, value) {
            (Interval::Text { start, end }, Value::String(s)) => {
                Some(s.as_str() >= start.as_str() && s.as_str() < end.as_str())
            }
            (Interval::Numeric { start, end }, v) if v.is_numeric() => {
                let x = v.as_float()?;
                Some(x >= *start && x < *end)
            }
            (Interval::Boolean { start, end }, Value::Bool(b)) => Some(b >= start && b < end),
            _ => None,
        }
    }

    fn bounds(&self) -> (String, String) {
        match self {
            Interval::Text { start, end } => (start.clone(), end.clone()),
            Interval::Numeric { start, end } => (start.to_string(), end.to_string()),
            Interval::Boolean { start, end } => (start.to_string(), end.to_string()),
        }
    }
}

/// Parameters of the interval filter.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalFilterConfig {
    pub kind: ElementKind,
    pub key: String,
    pub interval: Interval,
}

impl IntervalFilterConfig {
    pub fn new(
        kind: ElementKind,
        key: impl Into<String>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            key: key.into(),
            interval: Interval::between(start.into(), end.into())?,
        })
    }

    pub fn to_configuration(&self) -> StageConfiguration {
        let (start, end) = self.interval.bounds();
        StageConfiguration::new()
            .with(CLASS, self.kind)
            .with(KEY, &self.key)
            .with(VALUE_CLASS, self.interval.class())
            .with(START, start)
            .with(END, end)
    }

    pub fn from_configuration(conf: &StageConfiguration) -> Result<Self> {
        let kind = conf.require_parsed(CLASS)?;
        let key = conf.require(KEY)?.to_owned();
        let interval = match conf.require_parsed::<IntervalClass>(VALUE_CLASS)? {
            IntervalClass::Text => Interval::Text {
                start: conf.require(START)?.to_owned(),
                end: conf.require(END)?.to_owned(),
            },
            IntervalClass::Numeric => Interval::Numeric {
                start: conf.require_parsed(START)?,
                end: conf.require_parsed(END)?,
            },
            IntervalClass::Boolean => Interval::Boolean {
                start: conf.require_parsed(START)?,
                end: conf.require_parsed(END)?,
            },
        };
        Ok(Self { kind, key, interval })
    }
}

impl From<IntervalFilterConfig> for PipelineStep {
    fn from(config: IntervalFilterConfig) -> Self {
        PipelineStep::new(StageKind::IntervalFilter, config.to_configuration())
    }
}

/// Map-only filter task.
#[derive(Debug)]
pub struct IntervalFilterMap {
    config: IntervalFilterConfig,
}

impl IntervalFilterMap {
    /// `Ok(true)` when the element's property lies in the interval. A
    /// missing property fails the test; a property of another class is a
    /// type error.
    fn passes(&self, element: GraphElement<'_>) -> Result<bool> {
        let value = element.try_pick(&self.config.key, Self::NAME)?;
        if value.is_null() {
            return Ok(false);
        }
        self.config.interval.contains(&value).ok_or_else(|| Error::TypeMismatch {
            stage: Self::NAME,
            element: element.micro(),
            expected: self.config.interval.class().to_string(),
            got: value.type_name().to_owned(),
        })
    }
}

impl MapStage for IntervalFilterMap {
    const NAME: &'static str = "filter";

    type Key = ();
    type Value = ();

    fn setup(conf: &StageConfiguration, _registry: &ExtractorRegistry) -> Result<Self> {
        let config = IntervalFilterConfig::from_configuration(conf)?;
        debug!(kind = %config.kind, key = %config.key, interval = ?config.interval, "filter setup");
        Ok(Self { config })
    }

    fn map(&mut self, mut vertex: Vertex, ctx: &mut MapContext<'_, (), ()>) -> Result<()> {
        match self.config.kind {
            ElementKind::Vertex => {
                if vertex.has_paths() && !self.passes(GraphElement::from(&vertex))? {
                    vertex.clear_paths();
                    ctx.increment(Counter::VerticesFiltered, 1);
                }
            }
            ElementKind::Edge => {
                let mut filtered = 0;
                for edge in vertex.edges_mut(Direction::Both) {
                    if edge.has_paths() && !self.passes(GraphElement::from(&*edge))? {
                        edge.clear_paths();
                        filtered += 1;
                    }
                }
                ctx.increment(Counter::EdgesFiltered, filtered);
            }
        }
        ctx.write_graph(vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, EdgeId, VertexId};
    use crate::output::Outputs;
    use crate::output::SideEffect;

    fn run(config: IntervalFilterConfig, input: Vec<Vertex>) -> (Vec<Vertex>, crate::Counters) {
        let mut graph: Vec<Vertex> = Vec::new();
        let mut side: Vec<SideEffect> = Vec::new();
        let mut stage =
            IntervalFilterMap::setup(&config.to_configuration(), &ExtractorRegistry::new()).unwrap();
        let mut shuffle: Vec<((), ())> = Vec::new();
        let mut ctx = MapContext::new(Outputs::new(&mut graph, &mut side), &mut shuffle);
        for v in input {
            stage.map(v, &mut ctx).unwrap();
        }
        let counters = ctx.finish().unwrap();
        (graph, counters)
    }

    #[test]
    fn test_config_infers_value_class() {
        let text = IntervalFilterConfig::new(ElementKind::Vertex, "name", "a", "m").unwrap();
        assert_eq!(text.interval.class(), IntervalClass::Text);
        let num = IntervalFilterConfig::new(ElementKind::Vertex, "age", 18, 65.5).unwrap();
        assert_eq!(num.interval, Interval::Numeric { start: 18.0, end: 65.5 });
        let boolean = IntervalFilterConfig::new(ElementKind::Edge, "ok", false, true).unwrap();
        assert_eq!(boolean.interval.class(), IntervalClass::Boolean);

        assert!(IntervalFilterConfig::new(ElementKind::Vertex, "age", 1, "x").is_err());
        assert!(IntervalFilterConfig::new(ElementKind::Vertex, "age", Value::Null, 2).is_err());
    }

    #[test]
    fn test_configuration_round_trip() {
        let config = IntervalFilterConfig::new(ElementKind::Edge, "weight", 0.25, 1).unwrap();
        let back = IntervalFilterConfig::from_configuration(&config.to_configuration()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_unsupported_value_class_fails_setup() {
        let conf = IntervalFilterConfig::new(ElementKind::Vertex, "age", 1, 2)
            .unwrap()
            .to_configuration()
            .with(VALUE_CLASS, "java.util.Date");
        match IntervalFilterMap::setup(&conf, &ExtractorRegistry::new()) {
            Err(Error::Config { key, .. }) => assert_eq!(key, VALUE_CLASS),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_bounds_are_half_open() {
        let config = IntervalFilterConfig::new(ElementKind::Vertex, "age", 18, 65).unwrap();
        let input = [17, 18, 64, 65]
            .into_iter()
            .enumerate()
            .map(|(i, age)| Vertex::new(VertexId(i as u64)).with_property("age", age).with_paths(1))
            .collect();
        let (graph, counters) = run(config, input);

        let kept: Vec<u64> = graph.iter().filter(|v| v.has_paths()).map(|v| v.id.0).collect();
        assert_eq!(kept, vec![1, 2]);
        assert_eq!(graph.len(), 4);
        assert_eq!(counters.get(Counter::VerticesFiltered), 2);
    }

    #[test]
    fn test_missing_property_fails_and_inert_untouched() {
        let config = IntervalFilterConfig::new(ElementKind::Vertex, "age", 0, 100).unwrap();
        let input = vec![
            Vertex::new(VertexId(1)).with_paths(2),
            Vertex::new(VertexId(2)).with_property("age", 500),
        ];
        let (graph, counters) = run(config, input);
        assert!(!graph[0].has_paths());
        assert_eq!(counters.get(Counter::VerticesFiltered), 1);
    }

    #[test]
    fn test_edges_filtered_host_untouched() {
        let config = IntervalFilterConfig::new(ElementKind::Edge, "weight", 0.5, 1.0).unwrap();
        let v = Vertex::new(VertexId(1))
            .with_paths(4)
            .with_out_edge(
                Edge::new(EdgeId(1), VertexId(1), VertexId(2), "knows")
                    .with_property("weight", 0.4)
                    .with_paths(1),
            )
            .with_out_edge(
                Edge::new(EdgeId(2), VertexId(1), VertexId(3), "knows")
                    .with_property("weight", 0.5)
                    .with_paths(1),
            )
            .with_in_edge(
                Edge::new(EdgeId(3), VertexId(4), VertexId(1), "knows")
                    .with_property("weight", 1.0)
                    .with_paths(3),
            );
        let (graph, counters) = run(config, vec![v]);

        let paths: Vec<u64> = graph[0].edges(Direction::Both).map(|e| e.path_count()).collect();
        assert_eq!(paths, vec![0, 1, 0]);
        assert_eq!(graph[0].path_count(), 4);
        assert_eq!(counters.get(Counter::EdgesFiltered), 2);
    }

    #[test]
    fn test_wrong_property_class_is_type_error() {
        let config = IntervalFilterConfig::new(ElementKind::Vertex, "age", 18, 65).unwrap();
        let mut graph: Vec<Vertex> = Vec::new();
        let mut side: Vec<SideEffect> = Vec::new();
        let mut stage =
            IntervalFilterMap::setup(&config.to_configuration(), &ExtractorRegistry::new()).unwrap();
        let mut shuffle: Vec<((), ())> = Vec::new();
        let mut ctx = MapContext::new(Outputs::new(&mut graph, &mut side), &mut shuffle);
        let v = Vertex::new(VertexId(3)).with_property("age", "old").with_paths(1);
        assert!(matches!(stage.map(v, &mut ctx), Err(Error::TypeMismatch { .. })));
    }
}
