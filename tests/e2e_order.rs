//! End-to-end tests for Order: duplication by multiplicity, numeric scaling,
//! and key order in both directions.

use graph_pipeline::stage::OrderConfig;
use graph_pipeline::{
    ElementKind, Error, ExtractorRegistry, LocalExecutor, Pipeline, PipelineConfig, SideEffect,
    TypedValue, ValueType, Vertex, VertexId,
};
use pretty_assertions::assert_eq;

fn executor() -> LocalExecutor {
    LocalExecutor::new(PipelineConfig { map_tasks: 3, reduce_tasks: 1, ..PipelineConfig::default() })
        .unwrap()
}

fn people() -> Vec<Vertex> {
    [("marko", 29, 2), ("vadas", 27, 1), ("josh", 32, 3), ("peter", 35, 0)]
        .into_iter()
        .enumerate()
        .map(|(i, (name, age, paths))| {
            Vertex::new(VertexId(i as u64 + 1))
                .with_property("name", name)
                .with_property("age", age)
                .with_paths(paths)
        })
        .collect()
}

fn ordered(effects: &[SideEffect]) -> Vec<(String, TypedValue)> {
    effects
        .iter()
        .map(|effect| match effect {
            SideEffect::Ordered { label, key } => (label.clone(), key.clone()),
            other => panic!("unexpected side effect {other:?}"),
        })
        .collect()
}

fn run(config: OrderConfig) -> Vec<(String, TypedValue)> {
    let output = executor()
        .run_pipeline(&Pipeline::new().step(config), &ExtractorRegistry::new(), people())
        .unwrap();
    ordered(&output.stages[0].side_effects)
}

// ============================================================================
// 1. Text keys
// ============================================================================

#[test]
fn test_text_keys_repeat_per_path() {
    let out = run(OrderConfig::new(ElementKind::Vertex, "name", ValueType::Text, "name"));
    let names: Vec<&str> = out.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(names, vec!["josh", "josh", "josh", "marko", "marko", "vadas"]);
}

#[test]
fn test_text_keys_descending() {
    let out = run(OrderConfig::new(ElementKind::Vertex, "name", ValueType::Text, "name").descending());
    let names: Vec<&str> = out.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(names, vec!["vadas", "marko", "marko", "josh", "josh", "josh"]);
}

#[test]
fn test_emitted_count_matches_multiplicity() {
    let total: u64 = people().iter().map(Vertex::path_count).sum();
    let out = run(OrderConfig::new(ElementKind::Vertex, "name", ValueType::Text, "_id"));
    assert_eq!(out.len() as u64, total);
}

// ============================================================================
// 2. Numeric keys
// ============================================================================

#[test]
fn test_numeric_keys_scaled_by_paths() {
    let out = run(OrderConfig::new(ElementKind::Vertex, "age", ValueType::Long, "name"));
    assert_eq!(
        out,
        vec![
            ("vadas".to_owned(), TypedValue::Long(27)),
            ("marko".to_owned(), TypedValue::Long(58)),
            ("josh".to_owned(), TypedValue::Long(96)),
        ]
    );
}

#[test]
fn test_count_key_descending() {
    let out = run(OrderConfig::new(ElementKind::Vertex, "_count", ValueType::Int, "name").descending());
    assert_eq!(
        out,
        vec![
            ("josh".to_owned(), TypedValue::Int(3)),
            ("marko".to_owned(), TypedValue::Int(2)),
            ("vadas".to_owned(), TypedValue::Int(1)),
        ]
    );
}

// ============================================================================
// 3. Many reduce tasks
// ============================================================================

fn ages(n: i64) -> Vec<Vertex> {
    (0..n)
        .map(|age| Vertex::new(VertexId(age as u64)).with_property("age", age).with_paths(1))
        .collect()
}

fn run_partitioned(config: OrderConfig) -> Vec<TypedValue> {
    let executor =
        LocalExecutor::new(PipelineConfig { map_tasks: 4, reduce_tasks: 3, ..PipelineConfig::default() })
            .unwrap();
    let job = executor.run_step(&config.into(), &ExtractorRegistry::new(), ages(12)).unwrap();
    ordered(&job.side_effects).into_iter().map(|(_, key)| key).collect()
}

#[test]
fn test_sorted_across_reduce_tasks() {
    let keys = run_partitioned(OrderConfig::new(ElementKind::Vertex, "age", ValueType::Long, "_id"));
    assert_eq!(keys, (0..12).map(TypedValue::Long).collect::<Vec<_>>());
}

#[test]
fn test_descending_across_reduce_tasks() {
    let keys = run_partitioned(OrderConfig::new(ElementKind::Vertex, "age", ValueType::Long, "_id").descending());
    assert_eq!(keys, (0..12).rev().map(TypedValue::Long).collect::<Vec<_>>());
}

// ============================================================================
// 4. Failures
// ============================================================================

#[test]
fn test_boolean_keys_rejected_at_setup() {
    let step = OrderConfig::new(ElementKind::Vertex, "flag", ValueType::Boolean, "name");
    let err = executor().run_step(&step.into(), &ExtractorRegistry::new(), people()).unwrap_err();
    match err {
        Error::Task { source, .. } => assert!(matches!(*source, Error::Config { .. })),
        other => panic!("expected task error, got {other:?}"),
    }
}
