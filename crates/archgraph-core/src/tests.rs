//! Unit tests for archgraph-core

use std::path::PathBuf;

use crate::builder::GraphBuilder;
use crate::diagnostics::DiagnosticCode;
use crate::graph::ArchitectureGraph;
use crate::impact::ImpactAnalyzer;
use crate::model::*;
use crate::patterns::PatternDetector;
use crate::policy::{EnginePolicy, ImpactPolicy};
use crate::test_utils::{component, edge, unit_with_calls};

#[test]
fn component_id_is_stable_across_snapshots() {
    let id = ComponentId::new("src/billing");
    assert_eq!(id, ComponentId::new("src/billing"));
    assert_ne!(id, ComponentId::new("src/invoicing"));
}

#[test]
fn symbol_id_depends_on_kind() {
    let as_function = SymbolId::new("billing::charge", SymbolKind::Function);
    let as_class = SymbolId::new("billing::charge", SymbolKind::Class);
    assert_ne!(as_function, as_class);
}

#[test]
fn two_files_one_call_yield_single_weighted_edge() {
    // A defines Foo which calls Bar; B defines Bar.
    let units = vec![
        unit_with_calls("src/a.rs", "Foo", &["Bar"]),
        unit_with_calls("src/b.rs", "Bar", &[]),
    ];
    let outcome = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();
    let graph = outcome.graph;

    assert_eq!(graph.component_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    let edge = &graph.edges()[0];
    assert_eq!(edge.source, ComponentId::new("src/a"));
    assert_eq!(edge.target, ComponentId::new("src/b"));
    assert_eq!(edge.kind, RelationKind::Calls);
    assert_eq!(edge.weight, 1);
}

#[test]
fn repeated_calls_collapse_into_weight_not_parallel_edges() {
    let units = vec![
        unit_with_calls("src/a.rs", "Foo", &["Bar", "Bar"]),
        unit_with_calls("src/b.rs", "Bar", &[]),
    ];
    let outcome = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();

    assert_eq!(outcome.graph.component_count(), 2);
    assert_eq!(outcome.graph.edge_count(), 1);
    assert_eq!(outcome.graph.edges()[0].weight, 2);
}

#[test]
fn build_is_deterministic_regardless_of_unit_order() {
    let mut units = vec![
        unit_with_calls("src/web.rs", "handler", &["save", "render"]),
        unit_with_calls("src/store.rs", "save", &[]),
        unit_with_calls("src/view.rs", "render", &["save"]),
    ];
    let forward = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();
    units.reverse();
    let reversed = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();

    assert_eq!(forward.graph, reversed.graph);
    let forward_json = serde_json::to_vec(&forward.graph).unwrap();
    let reversed_json = serde_json::to_vec(&reversed.graph).unwrap();
    assert_eq!(forward_json, reversed_json);
}

#[test]
fn build_twice_is_idempotent() {
    let units = vec![
        unit_with_calls("src/a.rs", "Foo", &["Bar"]),
        unit_with_calls("src/b.rs", "Bar", &["Foo"]),
    ];
    let builder = GraphBuilder::new(GroupingPolicy::ByFile);
    let first = builder.build(&units).unwrap();
    let second = builder.build(&units).unwrap();

    assert_eq!(first.graph, second.graph);
    for (a, b) in first
        .graph
        .components()
        .iter()
        .zip(second.graph.components())
    {
        assert_eq!(a.id, b.id);
        assert_eq!(a.metrics, b.metrics);
    }
}

#[test]
fn self_loops_are_dropped() {
    let units = vec![unit_with_calls("src/a.rs", "Foo", &["Foo"])];
    let outcome = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();
    assert_eq!(outcome.graph.edge_count(), 0);
}

#[test]
fn unresolved_reference_becomes_external_not_error() {
    let units = vec![unit_with_calls("src/a.rs", "Foo", &["serde_json"])];
    let outcome = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();

    assert_eq!(outcome.graph.edge_count(), 0);
    assert_eq!(outcome.external_references.len(), 1);
    assert_eq!(outcome.external_references[0].target_name, "serde_json");
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::UnresolvedReference));
}

#[test]
fn ambiguous_alias_does_not_resolve() {
    // Two files both export `helper`; a call to the bare name must not
    // pick one arbitrarily.
    let units = vec![
        unit_with_calls("src/a.rs", "helper", &[]),
        unit_with_calls("src/b.rs", "helper", &[]),
        unit_with_calls("src/c.rs", "main", &["helper"]),
    ];
    let outcome = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();
    assert_eq!(outcome.graph.edge_count(), 0);
    assert_eq!(outcome.external_references.len(), 1);
}

#[test]
fn cycles_are_retained_and_flagged() {
    let units = vec![
        unit_with_calls("src/a.rs", "Foo", &["Bar"]),
        unit_with_calls("src/b.rs", "Bar", &["Foo"]),
    ];
    let outcome = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();
    let graph = outcome.graph;

    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.cycles().len(), 1);
    assert!(graph.components().iter().all(|c| c.metrics.in_cycle));
}

#[test]
fn package_grouping_merges_files_under_top_directory() {
    let units = vec![
        unit_with_calls("billing/charge.rs", "charge", &["persist"]),
        unit_with_calls("billing/store.rs", "persist", &[]),
        unit_with_calls("web/routes.rs", "route", &["charge"]),
    ];
    let outcome = GraphBuilder::new(GroupingPolicy::ByPackage).build(&units).unwrap();
    let graph = outcome.graph;

    assert_eq!(graph.component_count(), 2);
    // charge -> persist is intra-package and collapses to nothing.
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.edges()[0].source, ComponentId::new("web"));
    assert_eq!(graph.edges()[0].target, ComponentId::new("billing"));
}

#[test]
fn duplicate_component_id_is_fatal() {
    let components = vec![
        component("a", ComponentKind::Unknown),
        component("a", ComponentKind::Unknown),
    ];
    assert!(ArchitectureGraph::new(components, Vec::new()).is_err());
}

#[test]
fn dangling_edge_is_fatal() {
    let components = vec![component("a", ComponentKind::Unknown)];
    let edges = vec![edge("a", "ghost", RelationKind::Calls, 1)];
    assert!(ArchitectureGraph::new(components, edges).is_err());
}

#[test]
fn graph_edges_always_reference_existing_components() {
    let units = vec![
        unit_with_calls("src/a.rs", "Foo", &["Bar", "baz"]),
        unit_with_calls("src/b.rs", "Bar", &[]),
    ];
    let outcome = GraphBuilder::new(GroupingPolicy::ByFile).build(&units).unwrap();
    for edge in outcome.graph.edges() {
        assert!(outcome.graph.contains(edge.source));
        assert!(outcome.graph.contains(edge.target));
    }
}

// ── Impact ──────────────────────────────────────────────────────────

fn two_file_graph() -> ArchitectureGraph {
    let units = vec![
        unit_with_calls("src/a.rs", "Foo", &["Bar"]),
        unit_with_calls("src/b.rs", "Bar", &[]),
    ];
    GraphBuilder::new(GroupingPolicy::ByFile)
        .build(&units)
        .unwrap()
        .graph
}

#[test]
fn changing_one_file_decays_impact_over_one_hop() {
    let graph = two_file_graph();
    let changes = ChangeSet {
        changes: vec![FileChange {
            path: PathBuf::from("src/b.rs"),
            kind: ChangeKind::Modified,
        }],
    };
    let result = ImpactAnalyzer::new(ImpactPolicy::default())
        .impact(&changes, &graph)
        .unwrap();

    let bar = ComponentId::new("src/b");
    let foo = ComponentId::new("src/a");
    assert_eq!(result.directly_touched, vec![bar]);
    assert_eq!(result.scores.get(&bar), Some(&1.0));
    assert_eq!(result.scores.get(&foo), Some(&0.5));
    assert_eq!(result.scores.len(), 2);
}

#[test]
fn impact_decreases_with_hop_distance() {
    let units = vec![
        unit_with_calls("src/a.rs", "fa", &["fb"]),
        unit_with_calls("src/b.rs", "fb", &["fc"]),
        unit_with_calls("src/c.rs", "fc", &["fd"]),
        unit_with_calls("src/d.rs", "fd", &[]),
    ];
    let graph = GraphBuilder::new(GroupingPolicy::ByFile)
        .build(&units)
        .unwrap()
        .graph;
    let changes = ChangeSet {
        changes: vec![FileChange {
            path: PathBuf::from("src/a.rs"),
            kind: ChangeKind::Modified,
        }],
    };
    let result = ImpactAnalyzer::new(ImpactPolicy::default())
        .impact(&changes, &graph)
        .unwrap();

    let score = |key: &str| result.scores.get(&ComponentId::new(key)).copied().unwrap();
    assert!(score("src/a") >= score("src/b"));
    assert!(score("src/b") >= score("src/c"));
    assert!(score("src/c") >= score("src/d"));
}

#[test]
fn impact_respects_hop_limit_and_min_score() {
    let units = vec![
        unit_with_calls("src/a.rs", "fa", &["fb"]),
        unit_with_calls("src/b.rs", "fb", &["fc"]),
        unit_with_calls("src/c.rs", "fc", &["fd"]),
        unit_with_calls("src/d.rs", "fd", &["fe"]),
        unit_with_calls("src/e.rs", "fe", &[]),
    ];
    let graph = GraphBuilder::new(GroupingPolicy::ByFile)
        .build(&units)
        .unwrap()
        .graph;
    let policy = ImpactPolicy {
        hop_limit: 2,
        ..ImpactPolicy::default()
    };
    let changes = ChangeSet {
        changes: vec![FileChange {
            path: PathBuf::from("src/a.rs"),
            kind: ChangeKind::Modified,
        }],
    };
    let result = ImpactAnalyzer::new(policy).impact(&changes, &graph).unwrap();

    assert!(result.scores.contains_key(&ComponentId::new("src/c")));
    assert!(!result.scores.contains_key(&ComponentId::new("src/d")));
    assert!(!result.scores.contains_key(&ComponentId::new("src/e")));
}

#[test]
fn deleted_files_map_through_prior_snapshot() {
    let graph = two_file_graph();
    let changes = ChangeSet {
        changes: vec![FileChange {
            path: PathBuf::from("src/b.rs"),
            kind: ChangeKind::Deleted,
        }],
    };
    let result = ImpactAnalyzer::new(ImpactPolicy::default())
        .impact(&changes, &graph)
        .unwrap();
    assert_eq!(result.directly_touched, vec![ComponentId::new("src/b")]);
}

#[test]
fn touching_most_components_recommends_full_regeneration() {
    let graph = two_file_graph();
    let changes = ChangeSet {
        changes: vec![
            FileChange {
                path: PathBuf::from("src/a.rs"),
                kind: ChangeKind::Modified,
            },
            FileChange {
                path: PathBuf::from("src/b.rs"),
                kind: ChangeKind::Modified,
            },
        ],
    };
    let result = ImpactAnalyzer::new(ImpactPolicy::default())
        .impact(&changes, &graph)
        .unwrap();
    assert!(result.full_regeneration_recommended);
}

// ── Patterns ────────────────────────────────────────────────────────

#[test]
fn empty_graph_matches_nothing() {
    let graph = ArchitectureGraph::new(Vec::new(), Vec::new()).unwrap();
    let (matches, diagnostics) = PatternDetector::with_default_rules().detect(&graph);
    assert!(matches.is_empty());
    assert!(diagnostics.is_empty());
}

#[test]
fn layered_graph_produces_layer_matches() {
    let units = vec![
        unit_with_calls("src/web.rs", "route", &["apply"]),
        unit_with_calls("src/service.rs", "apply", &["persist"]),
        unit_with_calls("src/store.rs", "persist", &[]),
    ];
    let graph = GraphBuilder::new(GroupingPolicy::ByFile)
        .build(&units)
        .unwrap()
        .graph;
    let (matches, _) = PatternDetector::with_default_rules().detect(&graph);

    let layers: Vec<_> = matches
        .iter()
        .filter(|m| m.kind == PatternKind::Layered)
        .collect();
    assert_eq!(layers.len(), 3);
    assert!(layers.iter().all(|m| m.confidence > 0.99));
}

#[test]
fn cycle_rule_reports_sccs() {
    let units = vec![
        unit_with_calls("src/a.rs", "fa", &["fb"]),
        unit_with_calls("src/b.rs", "fb", &["fa"]),
        unit_with_calls("src/c.rs", "fc", &["fa"]),
    ];
    let graph = GraphBuilder::new(GroupingPolicy::ByFile)
        .build(&units)
        .unwrap()
        .graph;
    let (matches, _) = PatternDetector::with_default_rules().detect(&graph);

    let cycles: Vec<_> = matches
        .iter()
        .filter(|m| m.kind == PatternKind::CyclicDependency)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].components.len(), 2);
    assert_eq!(cycles[0].confidence, 1.0);
}

#[test]
fn repository_pattern_needs_service_callers() {
    let mut store = component("store/users", ComponentKind::Data);
    store.metrics.fan_in = 2;
    let mut svc_a = component("services/accounts", ComponentKind::Service);
    svc_a.metrics.fan_out = 1;
    let mut svc_b = component("services/billing", ComponentKind::Service);
    svc_b.metrics.fan_out = 1;
    let edges = vec![
        edge("services/accounts", "store/users", RelationKind::Calls, 3),
        edge("services/billing", "store/users", RelationKind::Calls, 1),
    ];
    let graph = ArchitectureGraph::new(vec![store, svc_a, svc_b], edges).unwrap();
    let (matches, _) = PatternDetector::with_default_rules().detect(&graph);

    let repos: Vec<_> = matches
        .iter()
        .filter(|m| m.kind == PatternKind::RepositoryAccess)
        .collect();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].components.len(), 3);
    assert_eq!(repos[0].confidence, 1.0);
}

#[test]
fn detection_is_deterministic() {
    let units = vec![
        unit_with_calls("src/web.rs", "route", &["apply"]),
        unit_with_calls("src/service.rs", "apply", &["persist"]),
        unit_with_calls("src/store.rs", "persist", &[]),
    ];
    let graph = GraphBuilder::new(GroupingPolicy::ByFile)
        .build(&units)
        .unwrap()
        .graph;
    let detector = PatternDetector::with_default_rules();
    let (first, _) = detector.detect(&graph);
    let (second, _) = detector.detect(&graph);
    assert_eq!(first, second);
}

// ── Policy ──────────────────────────────────────────────────────────

#[test]
fn policy_defaults_are_documented_values() {
    let policy = EnginePolicy::default();
    assert_eq!(policy.impact.decay, 0.5);
    assert_eq!(policy.impact.hop_limit, 3);
    assert_eq!(policy.diagram.edge_visibility_threshold, 2);
    assert!(policy.ai.enabled);
}

#[test]
fn policy_loads_partial_overrides_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archgraph.toml");
    std::fs::write(&path, "[impact]\ndecay = 0.25\nhop_limit = 5\n").unwrap();

    let policy = EnginePolicy::load(&path).unwrap();
    assert_eq!(policy.impact.decay, 0.25);
    assert_eq!(policy.impact.hop_limit, 5);
    // Untouched sections keep their defaults.
    assert_eq!(policy.diagram.regeneration_fraction, 0.4);
}

#[test]
fn missing_policy_file_falls_back_to_defaults() {
    let policy = EnginePolicy::load(std::path::Path::new("/nonexistent/archgraph.toml")).unwrap();
    assert_eq!(policy, EnginePolicy::default());
}
