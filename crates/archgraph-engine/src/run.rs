//! Analysis run orchestration
//!
//! One run is identified by (project, commit). Parsing fans out over a
//! bounded worker pool with per-file timeouts, identical concurrent
//! requests coalesce onto one in-flight run, and cancellation reaches
//! outstanding parse tasks promptly. Partial results always beat
//! aborting: skippable conditions land in the diagnostics list.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use archgraph_ai::{RenderPath, StyledRenderer};
use archgraph_core::{
    ArchitectureGraph, ChangeKind, ChangeSet, ComponentId, ContentHash, Diagnostic,
    DiagnosticCode, EnginePolicy, FileChange, GraphBuilder, ImpactAnalyzer, ImpactResult,
    ParseFailure, PatternDetector, PatternMatch, Snapshot, SourceUnit,
};
use archgraph_diagram::{mermaid, DiagramBuilder, DiagramModel, DiagramScope, DiagramType, ReconcileMode, Reconciler};
use archgraph_parser::{tag_for_path, AdapterRegistry, SymbolStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::persist::{SnapshotRecord, SnapshotStore};
use crate::vcs::{VcsError, VersionControl};

/// Fatal run failure. Everything recoverable is a diagnostic instead.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("run cancelled")]
    Cancelled,
    #[error("run timed out")]
    Timeout,
    #[error("version control failure: {0}")]
    Vcs(String),
    #[error("graph build failure: {0}")]
    GraphBuild(String),
}

/// Tuning and feature switches for one analysis request, recovered from
/// the original request surface.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub detect_patterns: bool,
    pub ai_enhanced: bool,
    pub diagram_type: DiagramType,
    /// Overall wall-clock budget for the run, in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            detect_patterns: true,
            ai_enhanced: true,
            diagram_type: DiagramType::Flowchart,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub project: String,
    pub reference: String,
    /// Prior ref for incremental analysis. None means a full run.
    pub prior_reference: Option<String>,
    pub options: AnalysisOptions,
}

/// Everything one run produced. Returned in memory even when
/// persistence failed.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis_id: String,
    pub snapshot: Snapshot,
    pub graph: ArchitectureGraph,
    pub patterns: Vec<PatternMatch>,
    pub impact: Option<ImpactResult>,
    pub diagram: DiagramModel,
    pub reconcile_mode: ReconcileMode,
    pub markup: String,
    pub render_path: RenderPath,
    pub diagnostics: Vec<Diagnostic>,
    pub parsed_files: usize,
    pub skipped_files: usize,
    pub created_at: DateTime<Utc>,
}

type SharedResult = Result<Arc<AnalysisOutcome>, EngineError>;

pub struct AnalysisEngine {
    vcs: Arc<dyn VersionControl>,
    store: Arc<dyn SnapshotStore>,
    registry: Arc<AdapterRegistry>,
    units: Arc<SymbolStore>,
    renderer: StyledRenderer,
    policy: EnginePolicy,
    /// At most one run per (project, commit) executes at a time; a later
    /// identical request awaits the in-flight result.
    inflight: DashMap<Snapshot, Arc<OnceCell<SharedResult>>>,
}

impl AnalysisEngine {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        store: Arc<dyn SnapshotStore>,
        registry: Arc<AdapterRegistry>,
        units: Arc<SymbolStore>,
        renderer: StyledRenderer,
        policy: EnginePolicy,
    ) -> Self {
        AnalysisEngine {
            vcs,
            store,
            registry,
            units,
            renderer,
            policy,
            inflight: DashMap::new(),
        }
    }

    /// Run (or join) the analysis identified by the request's project
    /// and reference.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        cancel: CancellationToken,
    ) -> SharedResult {
        let snapshot = Snapshot::new(&request.project, &request.reference);
        let cell = self
            .inflight
            .entry(snapshot.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| async {
                let deadline = request
                    .options
                    .timeout_secs
                    .map(std::time::Duration::from_secs);
                let run = self.execute(&request, &snapshot, &cancel);
                match deadline {
                    Some(limit) => tokio::time::timeout(limit, run)
                        .await
                        .unwrap_or(Err(EngineError::Timeout)),
                    None => run.await,
                }
            })
            .await
            .clone();

        self.inflight.remove(&snapshot);
        result
    }

    /// Delete stored results for a snapshot, and the project diagram
    /// with it when this was the last analysis backing it.
    pub async fn delete(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.store.delete_graph(snapshot).await?;
        if let Ok(Some(diagram)) = self.store.get_diagram(&snapshot.project).await {
            if diagram.snapshot == *snapshot {
                self.store.delete_diagram(&snapshot.project).await?;
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        request: &AnalysisRequest,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> SharedResult {
        let mut diagnostics = Vec::new();

        // ── Parse (parallel, bounded) ───────────────────────────────
        let files = self
            .list_files_with_retry(&request.project, &request.reference)
            .await
            .map_err(|e| match e {
                VcsError::NotFound(what) => EngineError::Vcs(format!("not found: {what}")),
                other => EngineError::Vcs(other.to_string()),
            })?;
        tracing::info!(files = files.len(), %snapshot, "analysis run started");

        let (parsed, skipped) = self
            .parse_files(request, &files, cancel, &mut diagnostics)
            .await?;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // ── Build graph ─────────────────────────────────────────────
        let build = GraphBuilder::new(self.policy.grouping)
            .build(&parsed)
            .map_err(|e| EngineError::GraphBuild(e.to_string()))?;
        diagnostics.extend(build.diagnostics);
        let graph = build.graph;

        // ── Detect patterns ─────────────────────────────────────────
        let patterns = if request.options.detect_patterns {
            let (matches, pattern_diagnostics) =
                PatternDetector::with_default_rules().detect(&graph);
            diagnostics.extend(pattern_diagnostics);
            matches
        } else {
            Vec::new()
        };

        // ── Impact against the prior snapshot ───────────────────────
        let (impact, scope) = self
            .compute_impact(request, &graph, &parsed, &mut diagnostics)
            .await;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // ── Diagram: build, reconcile, render ───────────────────────
        let fresh = DiagramBuilder::new(self.policy.diagram).build(
            snapshot.clone(),
            &graph,
            &patterns,
            &scope,
        );
        let prior_diagram = match self.store.get_diagram(&request.project).await {
            Ok(prior) => prior,
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::PersistenceFailure,
                    format!("prior diagram unavailable: {e}"),
                ));
                None
            }
        };
        let (diagram, reconcile_mode) = Reconciler::new(self.policy.diagram)
            .reconcile(fresh, prior_diagram.as_ref());

        let (markup, render_path) = if request.options.ai_enhanced {
            self.renderer
                .render(&diagram, request.options.diagram_type, &mut diagnostics)
                .await
        } else {
            (
                mermaid::render(&diagram, request.options.diagram_type),
                RenderPath::Deterministic,
            )
        };

        if cancel.is_cancelled() {
            // Partial results are discarded, never persisted.
            return Err(EngineError::Cancelled);
        }

        // ── Persist (failures are diagnostics, not errors) ──────────
        let created_at = Utc::now();
        let record = SnapshotRecord {
            snapshot: snapshot.clone(),
            graph: graph.clone(),
            manifest: parsed.iter().map(|u| (u.path.clone(), u.hash)).collect(),
            created_at,
        };
        if let Err(e) = self.store.put_graph(&record).await {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::PersistenceFailure,
                format!("graph snapshot not persisted: {e}"),
            ));
        }
        if let Err(e) = self.store.put_diagram(&request.project, &diagram).await {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::PersistenceFailure,
                format!("diagram model not persisted: {e}"),
            ));
        }

        tracing::info!(
            components = graph.component_count(),
            edges = graph.edge_count(),
            patterns = patterns.len(),
            warnings = diagnostics.len(),
            "analysis run complete"
        );

        Ok(Arc::new(AnalysisOutcome {
            analysis_id: snapshot.to_string(),
            snapshot: snapshot.clone(),
            graph,
            patterns,
            impact,
            diagram,
            reconcile_mode,
            markup,
            render_path,
            diagnostics,
            parsed_files: parsed.len(),
            skipped_files: skipped,
            created_at,
        }))
    }

    /// Fan out one bounded task per file. Slow parses become timeout
    /// ParseErrors; identical content coalesces in the symbol store.
    async fn parse_files(
        &self,
        request: &AnalysisRequest,
        files: &[PathBuf],
        cancel: &CancellationToken,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(Vec<Arc<SourceUnit>>, usize), EngineError> {
        let semaphore = Arc::new(Semaphore::new(self.policy.parse.effective_workers()));
        let file_timeout = self.policy.parse.file_timeout();
        let mut tasks: JoinSet<Option<(PathBuf, Result<Arc<SourceUnit>, ParseFailure>)>> =
            JoinSet::new();

        for path in files.iter().cloned() {
            let Some(tag) = tag_for_path(&path) else {
                diagnostics.push(Diagnostic::parse_error(
                    &path,
                    &ParseFailure::UnsupportedLanguage {
                        tag: path
                            .extension()
                            .and_then(|e| e.to_str())
                            .unwrap_or("none")
                            .to_string(),
                    },
                ));
                continue;
            };

            let vcs = Arc::clone(&self.vcs);
            let registry = Arc::clone(&self.registry);
            let units = Arc::clone(&self.units);
            let semaphore = Arc::clone(&semaphore);
            let token = cancel.clone();
            let project = request.project.clone();
            let reference = request.reference.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if token.is_cancelled() {
                    return None;
                }

                let content = match read_with_retry(vcs.as_ref(), &project, &reference, &path).await
                {
                    Ok(content) => content,
                    Err(e) => {
                        return Some((
                            path,
                            Err(ParseFailure::Malformed {
                                reason: format!("content unavailable: {e}"),
                            }),
                        ));
                    }
                };

                let hash = ContentHash::of(&content);
                let parse = {
                    let path = path.clone();
                    units.get_or_parse(hash, move || async move {
                        registry.parse(&path, &content, tag).await.map(Arc::new)
                    })
                };

                let result = tokio::select! {
                    _ = token.cancelled() => return None,
                    parsed = tokio::time::timeout(file_timeout, parse) => {
                        parsed.unwrap_or(Err(ParseFailure::Timeout))
                    }
                };
                Some((path, result))
            });
        }

        let mut parsed = Vec::new();
        let mut skipped = 0usize;
        while let Some(joined) = tasks.join_next().await {
            if cancel.is_cancelled() {
                tasks.abort_all();
                return Err(EngineError::Cancelled);
            }
            let Ok(Some((path, result))) = joined else {
                continue;
            };
            match result {
                Ok(unit) => parsed.push(unit),
                Err(failure) => {
                    skipped += 1;
                    diagnostics.push(Diagnostic::parse_error(&path, &failure));
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        Ok((parsed, skipped))
    }

    /// Impact of the change set against the prior snapshot, plus the
    /// diagram scope it implies. Unchanged components stay in scope so
    /// the persisted diagram remains complete; full regeneration is
    /// recommended past the policy threshold or on impact timeout.
    async fn compute_impact(
        &self,
        request: &AnalysisRequest,
        graph: &ArchitectureGraph,
        parsed: &[Arc<SourceUnit>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (Option<ImpactResult>, DiagramScope) {
        let Some(prior_ref) = &request.prior_reference else {
            return (None, DiagramScope::All);
        };
        let prior_snapshot = Snapshot::new(&request.project, prior_ref);
        let prior = match self.store.get_graph(&prior_snapshot).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!(%prior_snapshot, "no prior snapshot stored, full analysis");
                return (None, DiagramScope::All);
            }
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::PersistenceFailure,
                    format!("prior snapshot unavailable: {e}"),
                ));
                return (None, DiagramScope::All);
            }
        };

        let changes = match self
            .vcs
            .diff(&request.project, prior_ref, &request.reference)
            .await
        {
            Ok(changes) => changes,
            Err(VcsError::Transient(e)) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::ImpactComputationTimeout,
                    format!("diff unavailable ({e}), falling back to full regeneration"),
                ));
                return (None, DiagramScope::All);
            }
            // Collaborator can't diff: derive the change set from the
            // stored manifest instead.
            Err(_) => manifest_diff(&prior.manifest, parsed),
        };

        if changes.is_empty() {
            return (None, DiagramScope::All);
        }

        match ImpactAnalyzer::new(self.policy.impact).impact(&changes, &prior.graph) {
            Ok(impact) if impact.full_regeneration_recommended => {
                (Some(impact), DiagramScope::All)
            }
            Ok(impact) => {
                // The scope is the affected subgraph plus everything the
                // persisted diagram must keep covering: unchanged
                // carry-overs and components new in this snapshot.
                // Components that disappeared drop out here; their
                // diagram nodes go with them at reconcile time.
                let mut in_scope: HashSet<ComponentId> = impact.affected().collect();
                for component in graph.components() {
                    in_scope.insert(component.id);
                }
                (Some(impact), DiagramScope::Components(in_scope))
            }
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::ImpactComputationTimeout,
                    format!("{e}, falling back to full regeneration"),
                ));
                (None, DiagramScope::All)
            }
        }
    }

    async fn list_files_with_retry(
        &self,
        project: &str,
        reference: &str,
    ) -> Result<Vec<PathBuf>, VcsError> {
        match self.vcs.list_files(project, reference).await {
            Err(VcsError::Transient(e)) => {
                tracing::warn!("transient listing failure, retrying once: {e}");
                self.vcs.list_files(project, reference).await
            }
            other => other,
        }
    }
}

/// One retry on transient content failures; not-found aborts the file.
async fn read_with_retry(
    vcs: &dyn VersionControl,
    project: &str,
    reference: &str,
    path: &std::path::Path,
) -> Result<Vec<u8>, VcsError> {
    match vcs.file_content(project, reference, path).await {
        Err(VcsError::Transient(e)) => {
            tracing::warn!("transient read failure for {}, retrying once: {e}", path.display());
            vcs.file_content(project, reference, path).await
        }
        other => other,
    }
}

/// Change set from manifest comparison: added, modified, deleted, with
/// renames detected by content-hash equality between a deleted and an
/// added path.
pub fn manifest_diff(prior: &[(PathBuf, ContentHash)], parsed: &[Arc<SourceUnit>]) -> ChangeSet {
    let prior_map: HashMap<PathBuf, ContentHash> = prior.iter().cloned().collect();
    let current_map: HashMap<PathBuf, ContentHash> =
        parsed.iter().map(|u| (u.path.clone(), u.hash)).collect();

    let mut deleted: Vec<(PathBuf, ContentHash)> = prior_map
        .iter()
        .filter(|(path, _)| !current_map.contains_key(*path))
        .map(|(path, hash)| (path.clone(), *hash))
        .collect();
    deleted.sort();

    let mut changes = Vec::new();
    let mut consumed_deletions: HashSet<PathBuf> = HashSet::new();

    let mut current_paths: Vec<&PathBuf> = current_map.keys().collect();
    current_paths.sort();
    for path in current_paths {
        let hash = current_map[path];
        match prior_map.get(path) {
            Some(prior_hash) if *prior_hash == hash => {}
            Some(_) => changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Modified,
            }),
            None => {
                // Same content under a vanished path reads as a rename.
                let rename = deleted
                    .iter()
                    .find(|(old, old_hash)| *old_hash == hash && !consumed_deletions.contains(old))
                    .map(|(old, _)| old.clone());
                match rename {
                    Some(from) => {
                        consumed_deletions.insert(from.clone());
                        changes.push(FileChange {
                            path: path.clone(),
                            kind: ChangeKind::Renamed { from },
                        });
                    }
                    None => changes.push(FileChange {
                        path: path.clone(),
                        kind: ChangeKind::Added,
                    }),
                }
            }
        }
    }
    for (path, _) in deleted {
        if !consumed_deletions.contains(&path) {
            changes.push(FileChange {
                path,
                kind: ChangeKind::Deleted,
            });
        }
    }

    ChangeSet { changes }
}
