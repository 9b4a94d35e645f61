//! Unit tests for archgraph-diagram

use std::collections::HashSet;

use archgraph_core::policy::DiagramPolicy;
use archgraph_core::{
    ArchitectureGraph, Component, ComponentId, ComponentKind, ComponentMetrics, DependencyEdge,
    PatternKind, PatternMatch, RelationKind, Snapshot,
};

use crate::builder::DiagramBuilder;
use crate::mermaid;
use crate::model::{DiagramModel, DiagramScope, DiagramType};
use crate::reconcile::{ReconcileMode, Reconciler};

fn component(key: &str, kind: ComponentKind) -> Component {
    Component {
        id: ComponentId::new(key),
        group_key: key.to_string(),
        display_name: key.to_string(),
        kind,
        members: Vec::new(),
        files: vec![std::path::PathBuf::from(format!("{key}.rs"))],
        metrics: ComponentMetrics::default(),
    }
}

fn edge(source: &str, target: &str, weight: u32) -> DependencyEdge {
    DependencyEdge {
        source: ComponentId::new(source),
        target: ComponentId::new(target),
        kind: RelationKind::Calls,
        weight,
    }
}

fn chain_graph(keys: &[&str]) -> ArchitectureGraph {
    let components = keys
        .iter()
        .map(|k| component(k, ComponentKind::Unknown))
        .collect();
    let edges = keys
        .windows(2)
        .map(|pair| edge(pair[0], pair[1], 3))
        .collect();
    ArchitectureGraph::new(components, edges).unwrap()
}

fn snapshot() -> Snapshot {
    Snapshot::new("demo", "abc123")
}

fn build(graph: &ArchitectureGraph, matches: &[PatternMatch]) -> DiagramModel {
    DiagramBuilder::new(DiagramPolicy::default()).build(
        snapshot(),
        graph,
        matches,
        &DiagramScope::All,
    )
}

#[test]
fn every_in_scope_component_gets_one_node() {
    let graph = chain_graph(&["a", "b", "c"]);
    let model = build(&graph, &[]);
    assert_eq!(model.nodes.len(), 3);
    let components: HashSet<_> = model.nodes.iter().map(|n| n.component).collect();
    assert_eq!(components.len(), 3);
}

#[test]
fn scope_restricts_nodes_and_edges() {
    let graph = chain_graph(&["a", "b", "c"]);
    let scope = DiagramScope::Components(
        [ComponentId::new("a"), ComponentId::new("b")].into_iter().collect(),
    );
    let model = DiagramBuilder::new(DiagramPolicy::default()).build(
        snapshot(),
        &graph,
        &[],
        &scope,
    );
    assert_eq!(model.nodes.len(), 2);
    assert_eq!(model.edges.len(), 1);
}

#[test]
fn low_weight_edges_fall_below_visibility_threshold() {
    let components = vec![
        component("a", ComponentKind::Unknown),
        component("b", ComponentKind::Unknown),
        component("c", ComponentKind::Unknown),
    ];
    let edges = vec![edge("a", "b", 1), edge("a", "c", 5)];
    let graph = ArchitectureGraph::new(components, edges).unwrap();
    let model = build(&graph, &[]);

    assert_eq!(model.edges.len(), 1);
    assert_eq!(model.edges[0].weight, 5);
}

#[test]
fn cross_cluster_edges_are_always_kept() {
    let components = vec![
        component("a", ComponentKind::Unknown),
        component("b", ComponentKind::Unknown),
    ];
    let edges = vec![edge("a", "b", 1)];
    let graph = ArchitectureGraph::new(components, edges).unwrap();
    let matches = vec![
        PatternMatch {
            kind: PatternKind::Layered,
            label: "layer 0".to_string(),
            components: vec![ComponentId::new("a")],
            confidence: 1.0,
        },
        PatternMatch {
            kind: PatternKind::Layered,
            label: "layer 1".to_string(),
            components: vec![ComponentId::new("b")],
            confidence: 1.0,
        },
    ];
    let model = build(&graph, &matches);

    // Weight 1 is below the default threshold of 2, but the edge
    // crosses layers.
    assert_eq!(model.edges.len(), 1);
    assert_eq!(model.clusters.len(), 2);
}

#[test]
fn layers_follow_topological_order() {
    let graph = chain_graph(&["a", "b", "c"]);
    let model = build(&graph, &[]);
    let layer = |key: &str| {
        model
            .node_by_component(ComponentId::new(key))
            .unwrap()
            .layer
    };
    assert_eq!(layer("a"), 0);
    assert_eq!(layer("b"), 1);
    assert_eq!(layer("c"), 2);
}

#[test]
fn cyclic_graphs_still_get_layout_layers() {
    let components = vec![
        component("a", ComponentKind::Unknown),
        component("b", ComponentKind::Unknown),
    ];
    // Two-edge cycle; the weight-1 edge is dropped for layout only.
    let edges = vec![edge("a", "b", 4), edge("b", "a", 1)];
    let graph = ArchitectureGraph::new(components, edges).unwrap();
    let model = build(&graph, &[]);

    let layer = |key: &str| {
        model
            .node_by_component(ComponentId::new(key))
            .unwrap()
            .layer
    };
    assert_eq!(layer("a"), 0);
    assert_eq!(layer("b"), 1);
    // The stored graph keeps both directions.
    assert_eq!(graph.edge_count(), 2);
}

// ── Reconciliation ──────────────────────────────────────────────────

#[test]
fn no_prior_model_returns_initial_mode() {
    let graph = chain_graph(&["a", "b"]);
    let model = build(&graph, &[]);
    let (result, mode) = Reconciler::new(DiagramPolicy::default()).reconcile(model.clone(), None);
    assert_eq!(mode, ReconcileMode::Initial);
    assert_eq!(result, model);
}

#[test]
fn identical_component_sets_keep_every_prior_id() {
    let graph = chain_graph(&["a", "b", "c"]);
    let reconciler = Reconciler::new(DiagramPolicy::default());
    let (prior, _) = reconciler.reconcile(build(&graph, &[]), None);

    let (next, mode) = reconciler.reconcile(build(&graph, &[]), Some(&prior));
    assert_eq!(mode, ReconcileMode::Incremental);
    for node in &next.nodes {
        let prior_id = prior.node_by_component(node.component).unwrap().id;
        assert_eq!(node.id, prior_id);
    }
}

#[test]
fn one_added_node_in_five_keeps_four_prior_ids() {
    let reconciler = Reconciler::new(DiagramPolicy::default());
    let prior_graph = chain_graph(&["a", "b", "c", "d"]);
    let (prior, _) = reconciler.reconcile(build(&prior_graph, &[]), None);

    let next_graph = chain_graph(&["a", "b", "c", "d", "e"]);
    let (next, mode) = reconciler.reconcile(build(&next_graph, &[]), Some(&prior));

    assert_eq!(mode, ReconcileMode::Incremental);
    let kept = next
        .nodes
        .iter()
        .filter(|n| {
            prior
                .node_by_component(n.component)
                .map(|p| p.id == n.id)
                .unwrap_or(false)
        })
        .count();
    assert_eq!(kept, 4);

    let fresh = next
        .nodes
        .iter()
        .find(|n| n.component == ComponentId::new("e"))
        .unwrap();
    assert!(prior.nodes.iter().all(|p| p.id != fresh.id));
}

#[test]
fn removed_components_drop_out_of_the_model() {
    let reconciler = Reconciler::new(DiagramPolicy::default());
    let (prior, _) = reconciler.reconcile(build(&chain_graph(&["a", "b", "c"]), &[]), None);
    let (next, _) = reconciler.reconcile(build(&chain_graph(&["a", "b"]), &[]), Some(&prior));

    assert_eq!(next.nodes.len(), 2);
    assert!(next.node_by_component(ComponentId::new("c")).is_none());
}

#[test]
fn mostly_new_models_trigger_regeneration() {
    let reconciler = Reconciler::new(DiagramPolicy::default());
    let (prior, _) = reconciler.reconcile(build(&chain_graph(&["a", "b"]), &[]), None);
    let (next, mode) =
        reconciler.reconcile(build(&chain_graph(&["x", "y", "z"]), &[]), Some(&prior));

    assert_eq!(mode, ReconcileMode::Regenerated);
    // Regeneration still never recycles an id that the prior model used.
    let prior_ids: HashSet<_> = prior.nodes.iter().map(|n| n.id).collect();
    assert!(next.nodes.iter().all(|n| !prior_ids.contains(&n.id)));
}

#[test]
fn diagram_ids_stay_distinct_from_component_ids() {
    let graph = chain_graph(&["a", "b"]);
    let model = build(&graph, &[]);
    for node in &model.nodes {
        assert_ne!(node.id.0, node.component.0);
    }
}

#[test]
fn reconciled_edges_reference_final_ids() {
    let reconciler = Reconciler::new(DiagramPolicy::default());
    let (prior, _) = reconciler.reconcile(build(&chain_graph(&["a", "b", "c"]), &[]), None);
    let (next, _) =
        reconciler.reconcile(build(&chain_graph(&["a", "b", "c", "d"]), &[]), Some(&prior));

    let ids: HashSet<_> = next.nodes.iter().map(|n| n.id).collect();
    for edge in &next.edges {
        assert!(ids.contains(&edge.source));
        assert!(ids.contains(&edge.target));
    }
}

// ── Mermaid rendering ───────────────────────────────────────────────

#[test]
fn rendered_markup_is_structurally_valid() {
    let graph = chain_graph(&["web", "service", "store"]);
    let model = build(&graph, &[]);
    for diagram_type in [DiagramType::Flowchart, DiagramType::Component] {
        let markup = mermaid::render(&model, diagram_type);
        assert!(mermaid::looks_valid(&markup), "invalid:\n{markup}");
    }
}

#[test]
fn flowchart_render_contains_nodes_edges_and_clusters() {
    let components = vec![
        component("web", ComponentKind::Service),
        component("store", ComponentKind::Data),
    ];
    let edges = vec![edge("web", "store", 3)];
    let graph = ArchitectureGraph::new(components, edges).unwrap();
    let matches = vec![PatternMatch {
        kind: PatternKind::Layered,
        label: "layer 0".to_string(),
        components: vec![ComponentId::new("web")],
        confidence: 1.0,
    }];
    let model = build(&graph, &matches);
    let markup = mermaid::render(&model, DiagramType::Flowchart);

    assert!(markup.starts_with("flowchart TD"));
    assert!(markup.contains("subgraph cluster_0[\"layer 0\"]"));
    assert!(markup.contains("[\"web\"]"));
    // Data stores use the cylinder shape.
    assert!(markup.contains("[(\"store\")]"));
    assert!(markup.contains("-->|calls x3|"));
}

#[test]
fn rendering_is_deterministic() {
    let graph = chain_graph(&["a", "b", "c"]);
    let model = build(&graph, &[]);
    let first = mermaid::render(&model, DiagramType::Flowchart);
    let second = mermaid::render(&model, DiagramType::Flowchart);
    assert_eq!(first, second);
}

#[test]
fn quotes_in_labels_are_escaped() {
    let mut model = DiagramModel::empty(snapshot());
    let id = model.allocate_id();
    model.nodes.push(crate::model::DiagramNode {
        id,
        component: ComponentId::new("odd"),
        label: "say \"hi\"".to_string(),
        kind: ComponentKind::Unknown,
        cluster: None,
        layer: 0,
        position: None,
    });
    let markup = mermaid::render(&model, DiagramType::Flowchart);
    assert!(mermaid::looks_valid(&markup));
    assert!(markup.contains("say 'hi'"));
}

#[test]
fn validity_check_rejects_unbalanced_markup() {
    assert!(!mermaid::looks_valid("flowchart TD\n    n1[\"a\" --> n2"));
    assert!(!mermaid::looks_valid("classDiagram\n    A --> B"));
    assert!(!mermaid::looks_valid(""));
}
