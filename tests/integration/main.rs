//! Integration tests for Archgraph
//!
//! These drive the whole pipeline — local repository, parser pool,
//! symbol store, graph build, pattern detection, impact, diagram
//! reconciliation, persistence — the way the CLI wires it.

use std::path::Path;
use std::sync::Arc;

use archgraph_ai::StyledRenderer;
use archgraph_core::policy::AiPolicy;
use archgraph_core::{ComponentId, EnginePolicy, PatternKind, Snapshot};
use archgraph_diagram::{mermaid, DiagramType, ReconcileMode};
use archgraph_engine::{
    AnalysisEngine, AnalysisOptions, AnalysisRequest, FsStore, LocalRepository, PathFilters,
    SnapshotStore, CACHE_DIR,
};
use archgraph_parser::{create_parser_pool, AdapterRegistry, SymbolStore};
use tokio_util::sync::CancellationToken;

/// Engine wired exactly like the CLI, persisting under the repo root.
fn engine_over(root: &Path) -> AnalysisEngine {
    let policy = EnginePolicy::default();
    AnalysisEngine::new(
        Arc::new(LocalRepository::new(root, &PathFilters::default()).unwrap()),
        Arc::new(FsStore::new(root)),
        Arc::new(AdapterRegistry::new(create_parser_pool(2))),
        Arc::new(SymbolStore::new(policy.parse.store_capacity)),
        StyledRenderer::deterministic(AiPolicy::default()),
        policy,
    )
}

fn request(commit: &str, prior: Option<&str>) -> AnalysisRequest {
    AnalysisRequest {
        project: "demo".to_string(),
        reference: commit.to_string(),
        prior_reference: prior.map(|p| p.to_string()),
        options: AnalysisOptions {
            ai_enhanced: false,
            ..AnalysisOptions::default()
        },
    }
}

fn write_layered_repo(root: &Path) {
    std::fs::write(
        root.join("routes.py"),
        "from service import apply\n\ndef handle(req):\n    return apply(req)\n",
    )
    .unwrap();
    std::fs::write(
        root.join("service.py"),
        "from store import persist\n\ndef apply(req):\n    return persist(req)\n",
    )
    .unwrap();
    std::fs::write(root.join("store.py"), "def persist(req):\n    return True\n").unwrap();
}

#[tokio::test]
async fn full_pipeline_persists_under_the_cache_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_layered_repo(dir.path());

    let outcome = engine_over(dir.path())
        .analyze(request("c1", None), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.graph.component_count(), 3);
    assert_eq!(outcome.graph.edge_count(), 2);
    assert!(mermaid::looks_valid(&outcome.markup));
    assert!(dir.path().join(CACHE_DIR).join("graphs").exists());
    assert!(dir.path().join(CACHE_DIR).join("diagrams").exists());
}

#[tokio::test]
async fn layered_repo_is_detected_and_clustered() {
    let dir = tempfile::tempdir().unwrap();
    write_layered_repo(dir.path());

    let outcome = engine_over(dir.path())
        .analyze(request("c1", None), CancellationToken::new())
        .await
        .unwrap();

    let layers: Vec<_> = outcome
        .patterns
        .iter()
        .filter(|m| m.kind == PatternKind::Layered)
        .collect();
    assert_eq!(layers.len(), 3);

    // Layer matches become diagram clusters.
    assert_eq!(outcome.diagram.clusters.len(), 3);
    let markup = mermaid::render(&outcome.diagram, DiagramType::Flowchart);
    assert!(markup.contains("subgraph"));
}

#[tokio::test]
async fn incremental_run_survives_an_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    write_layered_repo(dir.path());

    // First engine instance analyzes and persists.
    let first = engine_over(dir.path())
        .analyze(request("c1", None), CancellationToken::new())
        .await
        .unwrap();

    // A fresh engine (new caches, as after a restart) picks up the
    // persisted snapshot for the incremental run.
    std::fs::write(
        dir.path().join("store.py"),
        "def persist(req):\n    return False\n",
    )
    .unwrap();
    let second = engine_over(dir.path())
        .analyze(request("c2", Some("c1")), CancellationToken::new())
        .await
        .unwrap();

    let impact = second.impact.as_ref().unwrap();
    let store_id = ComponentId::new("store");
    assert_eq!(impact.directly_touched, vec![store_id]);
    assert_eq!(impact.scores.get(&store_id), Some(&1.0));
    assert_eq!(
        impact.scores.get(&ComponentId::new("service")),
        Some(&0.5)
    );
    assert_eq!(
        impact.scores.get(&ComponentId::new("routes")),
        Some(&0.25)
    );

    // Unchanged components keep their stable diagram ids.
    for node in &second.diagram.nodes {
        let prior = first.diagram.node_by_component(node.component).unwrap();
        assert_eq!(node.id, prior.id);
    }
}

#[tokio::test]
async fn adding_one_file_allocates_exactly_one_fresh_diagram_id() {
    let dir = tempfile::tempdir().unwrap();
    write_layered_repo(dir.path());
    std::fs::write(dir.path().join("audit.py"), "def log(e):\n    return e\n").unwrap();
    std::fs::write(dir.path().join("auth.py"), "def check(u):\n    return u\n").unwrap();

    let first = engine_over(dir.path())
        .analyze(request("c1", None), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.diagram.nodes.len(), 5);

    std::fs::write(dir.path().join("extra.py"), "def extra():\n    return 0\n").unwrap();
    let second = engine_over(dir.path())
        .analyze(request("c2", Some("c1")), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.reconcile_mode, ReconcileMode::Incremental);
    assert_eq!(second.diagram.nodes.len(), 6);
    let kept = second
        .diagram
        .nodes
        .iter()
        .filter(|n| {
            first
                .diagram
                .node_by_component(n.component)
                .map(|p| p.id == n.id)
                .unwrap_or(false)
        })
        .count();
    assert_eq!(kept, 5);
}

#[tokio::test]
async fn identical_repos_build_byte_identical_graphs() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_layered_repo(dir_a.path());
    write_layered_repo(dir_b.path());

    let first = engine_over(dir_a.path())
        .analyze(request("c1", None), CancellationToken::new())
        .await
        .unwrap();
    let second = engine_over(dir_b.path())
        .analyze(request("c1", None), CancellationToken::new())
        .await
        .unwrap();

    let bytes_a = serde_json::to_vec(&first.graph).unwrap();
    let bytes_b = serde_json::to_vec(&second.graph).unwrap();
    assert_eq!(bytes_a, bytes_b);
    assert_eq!(first.markup, second.markup);
}

#[tokio::test]
async fn stored_records_round_trip_through_the_fs_store() {
    let dir = tempfile::tempdir().unwrap();
    write_layered_repo(dir.path());

    let outcome = engine_over(dir.path())
        .analyze(request("c1", None), CancellationToken::new())
        .await
        .unwrap();

    let store = FsStore::new(dir.path());
    let snapshot = Snapshot::new("demo", "c1");
    let record = store.get_graph(&snapshot).await.unwrap().unwrap();
    assert_eq!(record.graph, outcome.graph);
    assert_eq!(record.manifest.len(), 3);

    let diagram = store.get_diagram("demo").await.unwrap().unwrap();
    assert_eq!(diagram, outcome.diagram);

    store.delete_graph(&snapshot).await.unwrap();
    assert!(store.get_graph(&snapshot).await.unwrap().is_none());
}
