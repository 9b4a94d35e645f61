//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use archgraph_ai::{OpenRouterStyler, StyledRenderer};
use archgraph_core::{EnginePolicy, Severity, Snapshot};
use archgraph_diagram::{mermaid, DiagramType};
use archgraph_engine::{
    AnalysisEngine, AnalysisOptions, AnalysisRequest, FsStore, LocalRepository, PathFilters,
    SnapshotStore,
};
use archgraph_parser::{create_parser_pool, AdapterRegistry, SymbolStore};
use tokio_util::sync::CancellationToken;

pub struct AnalyzeFlags {
    pub no_patterns: bool,
    pub no_ai: bool,
    pub component_view: bool,
    pub output: Option<PathBuf>,
}

fn load_policy(root: &std::path::Path) -> anyhow::Result<EnginePolicy> {
    EnginePolicy::load(&root.join("archgraph.toml"))
}

fn build_engine(root: &std::path::Path, policy: &EnginePolicy) -> anyhow::Result<AnalysisEngine> {
    let repo = LocalRepository::new(root, &PathFilters::default())?;
    let store = FsStore::new(root);
    let registry = AdapterRegistry::new(create_parser_pool(policy.parse.effective_workers()));
    let units = SymbolStore::new(policy.parse.store_capacity);

    let styler = OpenRouterStyler::new(None, policy.ai.model.clone());
    let renderer = if policy.ai.enabled && styler.has_credentials() {
        StyledRenderer::new(Some(Box::new(styler)), policy.ai.clone())
    } else {
        StyledRenderer::deterministic(policy.ai.clone())
    };

    Ok(AnalysisEngine::new(
        Arc::new(repo),
        Arc::new(store),
        Arc::new(registry),
        Arc::new(units),
        renderer,
        policy.clone(),
    ))
}

pub async fn analyze(
    root: PathBuf,
    project: String,
    reference: String,
    since: Option<String>,
    flags: AnalyzeFlags,
) -> anyhow::Result<()> {
    let policy = load_policy(&root)?;
    let engine = build_engine(&root, &policy)?;

    let request = AnalysisRequest {
        project: project.clone(),
        reference,
        prior_reference: since,
        options: AnalysisOptions {
            detect_patterns: !flags.no_patterns,
            ai_enhanced: !flags.no_ai,
            diagram_type: if flags.component_view {
                DiagramType::Component
            } else {
                DiagramType::Flowchart
            },
            timeout_secs: None,
        },
    };

    // Ctrl-C cancels the run; partial results are discarded.
    let token = CancellationToken::new();
    let cancel_on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            cancel_on_interrupt.cancel();
        }
    });

    let outcome = engine.analyze(request, token).await?;

    tracing::info!(
        "analysis {}: {} components, {} edges, {} patterns",
        outcome.analysis_id,
        outcome.graph.component_count(),
        outcome.graph.edge_count(),
        outcome.patterns.len()
    );
    if let Some(impact) = &outcome.impact {
        tracing::info!(
            "impact: {} directly touched, {} affected",
            impact.directly_touched.len(),
            impact.scores.len()
        );
    }
    for diagnostic in &outcome.diagnostics {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!("{}", describe(diagnostic)),
            Severity::Info => tracing::debug!("{}", describe(diagnostic)),
        }
    }

    match flags.output {
        Some(path) => {
            std::fs::write(&path, &outcome.markup)?;
            tracing::info!("diagram written to {}", path.display());
        }
        None => println!("{}", outcome.markup),
    }
    Ok(())
}

pub async fn diagram(root: PathBuf, project: String, component_view: bool) -> anyhow::Result<()> {
    let store = FsStore::new(&root);
    let Some(model) = store.get_diagram(&project).await? else {
        anyhow::bail!("no stored diagram for project '{project}', run analyze first");
    };
    let diagram_type = if component_view {
        DiagramType::Component
    } else {
        DiagramType::Flowchart
    };
    println!("{}", mermaid::render(&model, diagram_type));
    Ok(())
}

pub async fn show(root: PathBuf, project: String, reference: String) -> anyhow::Result<()> {
    let store = FsStore::new(&root);
    let snapshot = Snapshot::new(project, reference);
    let Some(record) = store.get_graph(&snapshot).await? else {
        anyhow::bail!("no stored analysis for {snapshot}");
    };

    println!("analysis {snapshot} ({} files)", record.manifest.len());
    println!("created: {}", record.created_at.to_rfc3339());
    println!(
        "components: {}, edges: {}",
        record.graph.component_count(),
        record.graph.edge_count()
    );
    for component in record.graph.components() {
        println!(
            "  {:<30} {:?} (in {}, out {}, size {}{})",
            component.display_name,
            component.kind,
            component.metrics.fan_in,
            component.metrics.fan_out,
            component.metrics.size,
            if component.metrics.in_cycle { ", cyclic" } else { "" }
        );
    }
    Ok(())
}

pub async fn delete(root: PathBuf, project: String, reference: String) -> anyhow::Result<()> {
    let store = FsStore::new(&root);
    let snapshot = Snapshot::new(project.clone(), reference);
    store.delete_graph(&snapshot).await?;
    if let Some(diagram) = store.get_diagram(&project).await? {
        if diagram.snapshot == snapshot {
            store.delete_diagram(&project).await?;
        }
    }
    tracing::info!("deleted {snapshot}");
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    FsStore::new(&root).clear()?;
    tracing::info!("cache cleared");
    Ok(())
}

fn describe(diagnostic: &archgraph_core::Diagnostic) -> String {
    match &diagnostic.path {
        Some(path) => format!("{}: {}", path.display(), diagnostic.message),
        None => diagnostic.message.clone(),
    }
}
