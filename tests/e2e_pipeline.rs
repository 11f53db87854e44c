//! End-to-end pipeline tests: EdgesVertices, Count, Property and Transform,
//! stages chained through GRAPH, and the JSON-lines sink.

use graph_pipeline::stage::{
    CountConfig, EdgesVerticesConfig, GroupCountConfig, IntervalFilterConfig, PropertyConfig,
    TransformConfig,
};
use graph_pipeline::{
    Counter, Direction, Edge, EdgeId, ElementKind, Error, ExtractorRegistry, GroupKey,
    JsonLinesSink, LocalExecutor, MicroReference, Outputs, Pipeline, PipelineConfig, Record,
    SideEffect, StageKind, TypedValue, Value, ValueType, Vertex, VertexId,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

/// The classic six-vertex property graph, each vertex record carrying both
/// sides of its adjacency. Every edge starts with one path, vertices none.
fn modern() -> Vec<Vertex> {
    let edges = [
        (7, 1, 2, "knows", 0.5),
        (8, 1, 4, "knows", 1.0),
        (9, 1, 3, "created", 0.4),
        (10, 4, 5, "created", 1.0),
        (11, 4, 3, "created", 0.4),
        (12, 6, 3, "created", 0.2),
    ]
    .map(|(id, out, inv, label, weight)| {
        Edge::new(EdgeId(id), VertexId(out), VertexId(inv), label)
            .with_property("weight", weight)
            .with_paths(1)
    });
    let names = [
        (1, "marko", "person"),
        (2, "vadas", "person"),
        (3, "lop", "software"),
        (4, "josh", "person"),
        (5, "ripple", "software"),
        (6, "peter", "person"),
    ];

    names
        .into_iter()
        .map(|(id, name, kind)| {
            let mut v = Vertex::new(VertexId(id)).with_property("name", name).with_property("kind", kind);
            for edge in &edges {
                if edge.out_vertex == VertexId(id) {
                    v = v.with_out_edge(edge.clone());
                }
                if edge.in_vertex == VertexId(id) {
                    v = v.with_in_edge(edge.clone());
                }
            }
            v
        })
        .collect()
}

fn registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry
        .register_fn("kind", |e| e.pick("kind"))
        .register_fn("shout", |e| match e.pick("name") {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        })
        .register_try_fn("strict", |e| match e.pick("name") {
            Value::Null => Err(format!("{} has no name", e.micro()).into()),
            v => Ok(v),
        });
    registry
}

fn executor() -> LocalExecutor {
    LocalExecutor::new(PipelineConfig { map_tasks: 3, reduce_tasks: 2, ..PipelineConfig::default() })
        .unwrap()
}

fn total_paths(graph: &[Vertex]) -> u64 {
    graph.iter().map(Vertex::path_count).sum()
}

// ============================================================================
// 1. EdgesVertices
// ============================================================================

#[test]
fn test_incoming_moves_edge_paths_to_heads() {
    let job = executor()
        .run_step(&EdgesVerticesConfig::new(Direction::Incoming).into(), &registry(), modern())
        .unwrap();

    let paths: Vec<(u64, u64)> = job.graph.iter().map(|v| (v.id.0, v.path_count())).collect();
    assert_eq!(paths, vec![(1, 0), (2, 1), (3, 3), (4, 1), (5, 1), (6, 0)]);
    assert_eq!(job.counters.get(Counter::InEdgesProcessed), 6);
    assert_eq!(job.counters.get(Counter::OutEdgesProcessed), 0);
    for vertex in &job.graph {
        assert_eq!(vertex.edge_paths(Direction::Both), 0, "v[{}] kept edge paths", vertex.id);
    }
}

#[test]
fn test_both_conserves_multiplicity() {
    let input = modern();
    let before = total_paths(&input) + input.iter().map(|v| v.edge_paths(Direction::Both)).sum::<u64>();
    let job = executor()
        .run_step(&EdgesVerticesConfig::new(Direction::Both).into(), &registry(), input)
        .unwrap();
    assert_eq!(total_paths(&job.graph), before);
}

// ============================================================================
// 2. Count, Property, Transform
// ============================================================================

#[test]
fn test_count_over_edges_and_vertices() {
    let executor = executor();
    let edges = executor
        .run_step(&CountConfig::new(ElementKind::Edge).into(), &registry(), modern())
        .unwrap();
    let counts: Vec<&SideEffect> = edges
        .side_effects
        .iter()
        .filter(|e| matches!(e, SideEffect::Count { .. }))
        .collect();
    assert_eq!(counts, vec![&SideEffect::Count { total: 6 }]);
    assert_eq!(edges.counters.get(Counter::EdgesCounted), 6);

    let vertices = executor
        .run_step(&CountConfig::new(ElementKind::Vertex).into(), &registry(), modern())
        .unwrap();
    assert_eq!(vertices.side_effects, vec![SideEffect::Count { total: 0 }]);
}

#[test]
fn test_property_values_repeat_per_path() {
    let mut input = modern();
    input[0].set_paths(2);
    input[3].set_paths(1);
    let job = executor()
        .run_step(&PropertyConfig::new(ElementKind::Vertex, "name", ValueType::Text).into(), &registry(), input)
        .unwrap();
    assert_eq!(
        job.side_effects,
        vec![
            SideEffect::Property { value: TypedValue::Text("marko".into()) },
            SideEffect::Property { value: TypedValue::Text("marko".into()) },
            SideEffect::Property { value: TypedValue::Text("josh".into()) },
        ]
    );
    assert_eq!(job.counters.get(Counter::VerticesProcessed), 2);
}

#[test]
fn test_transform_applies_registered_function() {
    let mut input = modern();
    input[1].set_paths(1);
    input[4].set_paths(2);
    let job = executor()
        .run_step(&TransformConfig::new(ElementKind::Vertex, "shout").into(), &registry(), input)
        .unwrap();
    let texts: Vec<&SideEffect> = job.side_effects.iter().collect();
    assert_eq!(
        texts,
        vec![
            &SideEffect::Text { value: "VADAS".into() },
            &SideEffect::Text { value: "RIPPLE".into() },
            &SideEffect::Text { value: "RIPPLE".into() },
        ]
    );
}

#[test]
fn test_transform_failure_names_element() {
    let input = vec![Vertex::new(VertexId(42)).with_paths(1)];
    let err = executor()
        .run_step(&TransformConfig::new(ElementKind::Vertex, "strict").into(), &registry(), input)
        .unwrap_err();
    assert!(err.to_string().contains("v[42] has no name"), "{err}");
}

#[test]
fn test_unknown_extractor_is_config_error() {
    let err = executor()
        .run_step(&TransformConfig::new(ElementKind::Vertex, "missing").into(), &registry(), modern())
        .unwrap_err();
    match err {
        Error::Task { source, .. } => assert!(matches!(*source, Error::Config { .. })),
        other => panic!("expected task error, got {other:?}"),
    }
}

// ============================================================================
// 3. Chaining
// ============================================================================

#[test]
fn test_weighted_edges_into_grouped_heads() {
    // Keep heavy edges, move their paths onto the head vertex, group heads by kind.
    let pipeline = Pipeline::new()
        .step(IntervalFilterConfig::new(ElementKind::Edge, "weight", 0.5, 2.0).unwrap())
        .step(EdgesVerticesConfig::new(Direction::Incoming))
        .step(GroupCountConfig::new(ElementKind::Vertex).key_extractor("kind"))
        .step(CountConfig::new(ElementKind::Vertex));

    let output = executor().run_pipeline(&pipeline, &registry(), modern()).unwrap();
    let kinds: Vec<StageKind> = output.stages.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![StageKind::IntervalFilter, StageKind::EdgesVertices, StageKind::GroupCount, StageKind::Count]
    );

    let mut groups: Vec<(GroupKey, i64)> = output.stages[2]
        .side_effects
        .iter()
        .filter_map(|e| match e {
            SideEffect::Group { key, count } => Some((key.clone(), *count)),
            _ => None,
        })
        .collect();
    groups.sort();
    assert_eq!(
        groups,
        vec![(GroupKey::Text("person".into()), 2), (GroupKey::Text("software".into()), 1)]
    );
    assert_eq!(output.stages[3].side_effects, vec![SideEffect::Count { total: 3 }]);
    assert_eq!(total_paths(&output.graph), 3);
}

#[test]
fn test_pipeline_survives_json_round_trip() {
    let pipeline = Pipeline::new()
        .step(EdgesVerticesConfig::new(Direction::Both))
        .step(GroupCountConfig::new(ElementKind::Vertex));
    let decoded = Pipeline::from_json(&pipeline.to_json().unwrap()).unwrap();

    let a = executor().run_pipeline(&pipeline, &registry(), modern()).unwrap();
    let b = executor().run_pipeline(&decoded, &registry(), modern()).unwrap();
    assert_eq!(a, b);
    assert!(a.stages[1].side_effects.contains(&SideEffect::Group {
        key: GroupKey::Micro(MicroReference::Vertex(VertexId(3))),
        count: 3,
    }));
}

// ============================================================================
// 4. JSON-lines sink
// ============================================================================

#[test]
fn test_json_lines_channels() {
    let mut graph = JsonLinesSink::new(Vec::new());
    let mut side = JsonLinesSink::new(Vec::new());
    {
        let mut outputs = Outputs::new(&mut graph, &mut side);
        outputs.write_graph(Vertex::new(VertexId(1)).with_property("name", "marko").with_paths(2)).unwrap();
        outputs.write_side_effect(SideEffect::Count { total: 2 }).unwrap();
        outputs.close().unwrap();
        assert!(outputs.write_side_effect(SideEffect::Count { total: 3 }).is_err());
    }

    let graph = String::from_utf8(graph.into_inner()).unwrap();
    let side = String::from_utf8(side.into_inner()).unwrap();
    let records: Vec<Record> = graph
        .lines()
        .chain(side.lines())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        records,
        vec![
            Record::Graph(Vertex::new(VertexId(1)).with_property("name", "marko").with_paths(2)),
            Record::SideEffect(SideEffect::Count { total: 2 }),
        ]
    );
    assert!(side.starts_with(r#"{"channel":"side_effect","record":{"kind":"count","total":2}}"#));
}
