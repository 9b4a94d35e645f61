//! Aggregates parsed source units into an architecture graph

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::diagnostics::{Diagnostic, DiagnosticCode, GraphBuildError};
use crate::graph::ArchitectureGraph;
use crate::model::{
    Component, ComponentId, ComponentKind, ComponentMetrics, DependencyEdge, GroupingPolicy,
    RelationKind, SourceUnit,
};

/// Output of one graph build: the graph plus non-fatal diagnostics
/// (unresolved references kept as external edges).
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: ArchitectureGraph,
    /// References whose targets matched no in-repo symbol, collapsed per
    /// (source component, external name, kind).
    pub external_references: Vec<ExternalReference>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A reference pointing outside the analyzed repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    pub source: ComponentId,
    pub target_name: String,
    pub kind: RelationKind,
    pub weight: u32,
}

/// Builds an [`ArchitectureGraph`] from a set of source units.
///
/// Output ordering is fully determined by the total order (group key,
/// then relation kind): parse completion order never affects the
/// result.
pub struct GraphBuilder {
    policy: GroupingPolicy,
}

impl GraphBuilder {
    pub fn new(policy: GroupingPolicy) -> Self {
        GraphBuilder { policy }
    }

    pub fn build(&self, units: &[Arc<SourceUnit>]) -> Result<BuildOutcome, GraphBuildError> {
        // Deterministic unit order regardless of how the caller's
        // parallel parse tasks completed.
        let mut ordered: Vec<&Arc<SourceUnit>> = units.iter().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path).then(a.hash.cmp(&b.hash)));
        ordered.dedup_by(|a, b| a.path == b.path && a.hash == b.hash);

        // 1. Assign each symbol to one component per the grouping policy.
        let mut groups: BTreeMap<String, GroupDraft> = BTreeMap::new();
        for unit in &ordered {
            let key = group_key(&unit.path, self.policy);
            let draft = groups.entry(key.clone()).or_insert_with(|| GroupDraft {
                key,
                files: Vec::new(),
                symbols: Vec::new(),
            });
            if !draft.files.contains(&unit.path) {
                draft.files.push(unit.path.clone());
            }
            for symbol in &unit.symbols {
                draft.symbols.push(symbol.clone());
            }
        }

        // Resolution tables: exact qualified name, then unambiguous
        // public alias. Ambiguous aliases resolve to nothing.
        let mut by_qualified: HashMap<&str, ComponentId> = HashMap::new();
        let mut by_alias: HashMap<&str, AliasSlot> = HashMap::new();
        for draft in groups.values() {
            let component_id = ComponentId::new(&draft.key);
            for symbol in &draft.symbols {
                by_qualified.insert(symbol.qualified_name.as_str(), component_id);
                if let Some(alias) = &symbol.alias {
                    by_alias
                        .entry(alias.as_str())
                        .and_modify(|slot| {
                            if slot.owner != component_id {
                                slot.ambiguous = true;
                            }
                        })
                        .or_insert(AliasSlot {
                            owner: component_id,
                            ambiguous: false,
                        });
                }
            }
        }

        // 2+3. Resolve references and collapse parallel ones into
        // weighted edges keyed by (source, target, kind).
        let mut edge_weights: BTreeMap<(String, String, RelationKind), u32> = BTreeMap::new();
        let component_keys: HashMap<ComponentId, String> = groups
            .values()
            .map(|d| (ComponentId::new(&d.key), d.key.clone()))
            .collect();
        let mut externals: BTreeMap<(String, String, RelationKind), u32> = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for unit in &ordered {
            let source_key = group_key(&unit.path, self.policy);
            let source_id = ComponentId::new(&source_key);
            for reference in &unit.references {
                match resolve(&reference.target, &by_qualified, &by_alias) {
                    Some(target_id) if target_id == source_id => {
                        // Self-loops carry no architectural information.
                    }
                    Some(target_id) => {
                        let target_key = component_keys
                            .get(&target_id)
                            .expect("resolved component registered")
                            .clone();
                        *edge_weights
                            .entry((source_key.clone(), target_key, reference.kind))
                            .or_insert(0) += 1;
                    }
                    None => {
                        *externals
                            .entry((
                                source_key.clone(),
                                reference.target.clone(),
                                reference.kind,
                            ))
                            .or_insert(0) += 1;
                    }
                }
            }
        }

        for (source_key, target_name, kind) in externals.keys() {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::UnresolvedReference,
                    format!(
                        "'{source_key}' {} '{target_name}' outside the analyzed set",
                        verb(*kind)
                    ),
                ),
            );
        }

        let external_references = externals
            .into_iter()
            .map(|((source_key, target_name, kind), weight)| ExternalReference {
                source: ComponentId::new(&source_key),
                target_name,
                kind,
                weight,
            })
            .collect();

        // Materialize components in group-key order.
        let mut components: Vec<Component> = groups
            .into_values()
            .map(|draft| {
                let id = ComponentId::new(&draft.key);
                let mut members: Vec<_> = draft.symbols.iter().map(|s| s.id()).collect();
                members.sort();
                members.dedup();
                let size = members.len() as u32;
                Component {
                    id,
                    display_name: display_name(&draft.key),
                    kind: ComponentKind::from_name(&draft.key),
                    group_key: draft.key,
                    members,
                    files: draft.files,
                    metrics: ComponentMetrics {
                        size,
                        ..ComponentMetrics::default()
                    },
                }
            })
            .collect();

        let edges: Vec<DependencyEdge> = edge_weights
            .into_iter()
            .map(|((source_key, target_key, kind), weight)| DependencyEdge {
                source: ComponentId::new(&source_key),
                target: ComponentId::new(&target_key),
                kind,
                weight,
            })
            .collect();

        // 4. Per-component metrics: distinct in/out edges and cycle
        // membership via SCC over the finished topology.
        let mut fan_in: HashMap<ComponentId, u32> = HashMap::new();
        let mut fan_out: HashMap<ComponentId, u32> = HashMap::new();
        for edge in &edges {
            *fan_out.entry(edge.source).or_insert(0) += 1;
            *fan_in.entry(edge.target).or_insert(0) += 1;
        }
        for component in &mut components {
            component.metrics.fan_in = fan_in.get(&component.id).copied().unwrap_or(0);
            component.metrics.fan_out = fan_out.get(&component.id).copied().unwrap_or(0);
        }

        let mut graph = ArchitectureGraph::new(components, edges)?;
        let cyclic: HashSet<ComponentId> = graph.cycles().into_iter().flatten().collect();
        for id in cyclic {
            if let Some(component) = graph.component_mut(id) {
                component.metrics.in_cycle = true;
            }
        }

        Ok(BuildOutcome {
            graph,
            external_references,
            diagnostics,
        })
    }
}

struct GroupDraft {
    key: String,
    files: Vec<std::path::PathBuf>,
    symbols: Vec<crate::model::SymbolDecl>,
}

struct AliasSlot {
    owner: ComponentId,
    ambiguous: bool,
}

/// A reference resolves iff its name matches exactly one symbol's
/// qualified name or unambiguous public alias. The last path segment of
/// a dotted/scoped target is tried as an alias as well, so `pkg.Bar`
/// and `Bar()` both reach a symbol aliased `Bar`.
fn resolve(
    target: &str,
    by_qualified: &HashMap<&str, ComponentId>,
    by_alias: &HashMap<&str, AliasSlot>,
) -> Option<ComponentId> {
    if let Some(&id) = by_qualified.get(target) {
        return Some(id);
    }
    let last = target
        .rsplit(['.', ':', '/'])
        .next()
        .filter(|s| !s.is_empty())?;
    match by_alias.get(last) {
        Some(slot) if !slot.ambiguous => Some(slot.owner),
        _ => None,
    }
}

fn group_key(path: &Path, policy: GroupingPolicy) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    match policy {
        GroupingPolicy::ByFile => match normalized.rsplit_once('/') {
            Some((dir, file)) => format!("{dir}/{}", strip_extension(file)),
            None => strip_extension(&normalized).to_string(),
        },
        GroupingPolicy::ByPackage => match normalized.split_once('/') {
            // Top-level package directory.
            Some((first, _)) if !first.is_empty() => first.to_string(),
            // A bare file at the root groups under its own stem.
            _ => strip_extension(&normalized).to_string(),
        },
    }
}

fn strip_extension(file: &str) -> &str {
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

fn display_name(group_key: &str) -> String {
    group_key
        .rsplit('/')
        .next()
        .unwrap_or(group_key)
        .to_string()
}

fn verb(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Calls => "calls",
        RelationKind::Imports => "imports",
        RelationKind::Extends => "extends",
        RelationKind::Composes => "composes",
    }
}
