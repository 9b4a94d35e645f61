//! Architectural pattern rules evaluated over a completed graph
//!
//! Rules are independent predicates over local graph shape. They never
//! mutate the graph, may produce overlapping matches, and a rule that
//! fails is isolated: its matches are skipped and the other rules keep
//! their results. No-match is a normal outcome.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use petgraph::algo::{condensation, toposort};
use rayon::prelude::*;

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::graph::ArchitectureGraph;
use crate::model::{ComponentId, ComponentKind, PatternKind, PatternMatch};

pub trait PatternRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, graph: &ArchitectureGraph) -> anyhow::Result<Vec<PatternMatch>>;
}

/// Runs the registered rule set. Rules are read-only over the graph and
/// evaluate in parallel; output order follows registration order so
/// detection is deterministic.
pub struct PatternDetector {
    rules: Vec<Box<dyn PatternRule>>,
}

impl PatternDetector {
    pub fn with_default_rules() -> Self {
        PatternDetector {
            rules: vec![
                Box::new(LayeredRule),
                Box::new(RepositoryAccessRule),
                Box::new(HubRule),
                Box::new(CycleRule),
                Box::new(MicroserviceGroupRule),
            ],
        }
    }

    pub fn detect(&self, graph: &ArchitectureGraph) -> (Vec<PatternMatch>, Vec<Diagnostic>) {
        let evaluated: Vec<(usize, Result<Vec<PatternMatch>, String>)> = self
            .rules
            .par_iter()
            .enumerate()
            .map(|(pos, rule)| {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(graph)));
                let outcome = match outcome {
                    Ok(Ok(matches)) => Ok(matches),
                    Ok(Err(err)) => Err(format!("rule '{}' failed: {err}", rule.name())),
                    Err(_) => Err(format!("rule '{}' panicked", rule.name())),
                };
                (pos, outcome)
            })
            .collect();

        let mut ordered = evaluated;
        ordered.sort_by_key(|(pos, _)| *pos);

        let mut matches = Vec::new();
        let mut diagnostics = Vec::new();
        for (_, outcome) in ordered {
            match outcome {
                Ok(found) => matches.extend(found),
                Err(message) => {
                    tracing::warn!("{message}");
                    diagnostics.push(Diagnostic::new(DiagnosticCode::PatternRuleFailure, message));
                }
            }
        }
        (matches, diagnostics)
    }
}

/// Layer levels per component, shared by the layered rule and diagram
/// layout. Levels come from topological order over the cycle-condensed
/// graph, so cyclic groups share one level.
pub fn layer_levels(graph: &ArchitectureGraph) -> HashMap<ComponentId, u32> {
    let projection = graph.to_petgraph();
    let plain: petgraph::Graph<ComponentId, ()> =
        projection.inner.map(|_, id| *id, |_, _| ()).into();
    let condensed = condensation(plain, true);
    let order = toposort(&condensed, None).expect("condensation is acyclic");

    let mut levels: HashMap<ComponentId, u32> = HashMap::new();
    let mut scc_level: HashMap<petgraph::graph::NodeIndex, u32> = HashMap::new();
    for idx in order {
        let level = condensed
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|pred| scc_level.get(&pred))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        scc_level.insert(idx, level);
        for id in &condensed[idx] {
            levels.insert(*id, level);
        }
    }
    levels
}

/// Layered architecture: components partition into at least three
/// layers with the dominant edge direction pointing downward.
struct LayeredRule;

impl PatternRule for LayeredRule {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn evaluate(&self, graph: &ArchitectureGraph) -> anyhow::Result<Vec<PatternMatch>> {
        let levels = layer_levels(graph);
        let mut layers: HashMap<u32, Vec<ComponentId>> = HashMap::new();
        for component in graph.components() {
            let level = levels.get(&component.id).copied().unwrap_or(0);
            layers.entry(level).or_default().push(component.id);
        }
        if layers.len() < 3 {
            return Ok(Vec::new());
        }

        // Confidence: fraction of edges descending exactly one-way.
        let total = graph.edge_count();
        if total == 0 {
            return Ok(Vec::new());
        }
        let forward = graph
            .edges()
            .iter()
            .filter(|e| levels.get(&e.source) < levels.get(&e.target))
            .count();
        let confidence = forward as f64 / total as f64;
        if confidence < 0.6 {
            return Ok(Vec::new());
        }

        let mut ordered: Vec<(u32, Vec<ComponentId>)> = layers.into_iter().collect();
        ordered.sort_by_key(|(level, _)| *level);
        Ok(ordered
            .into_iter()
            .map(|(level, mut components)| {
                components.sort();
                PatternMatch {
                    kind: PatternKind::Layered,
                    label: format!("layer {level}"),
                    components,
                    confidence,
                }
            })
            .collect())
    }
}

/// Repository access: a data-kind component with fan-in from
/// service-kind components and no non-data outgoing edges.
struct RepositoryAccessRule;

impl PatternRule for RepositoryAccessRule {
    fn name(&self) -> &'static str {
        "repository-access"
    }

    fn evaluate(&self, graph: &ArchitectureGraph) -> anyhow::Result<Vec<PatternMatch>> {
        let mut matches = Vec::new();
        for component in graph.components() {
            if component.kind != ComponentKind::Data || component.metrics.fan_in < 2 {
                continue;
            }
            let outgoing_ok = graph.edges_from(component.id).all(|e| {
                graph
                    .component(e.target)
                    .map(|t| t.kind == ComponentKind::Data)
                    .unwrap_or(false)
            });
            if !outgoing_ok {
                continue;
            }
            let incoming: Vec<_> = graph.edges_to(component.id).collect();
            let from_services = incoming
                .iter()
                .filter(|e| {
                    graph
                        .component(e.source)
                        .map(|s| s.kind == ComponentKind::Service)
                        .unwrap_or(false)
                })
                .count();
            if from_services == 0 {
                continue;
            }
            let confidence = from_services as f64 / incoming.len() as f64;
            let mut components: Vec<ComponentId> = incoming
                .iter()
                .map(|e| e.source)
                .chain(std::iter::once(component.id))
                .collect();
            components.sort();
            components.dedup();
            matches.push(PatternMatch {
                kind: PatternKind::RepositoryAccess,
                label: component.display_name.clone(),
                components,
                confidence,
            });
        }
        Ok(matches)
    }
}

/// Hub: a component whose fan-in is an outlier against the graph mean.
struct HubRule;

impl PatternRule for HubRule {
    fn name(&self) -> &'static str {
        "hub"
    }

    fn evaluate(&self, graph: &ArchitectureGraph) -> anyhow::Result<Vec<PatternMatch>> {
        let count = graph.component_count();
        if count < 4 {
            return Ok(Vec::new());
        }
        let mean =
            graph.components().iter().map(|c| c.metrics.fan_in as f64).sum::<f64>() / count as f64;
        let mut matches = Vec::new();
        for component in graph.components() {
            let fan_in = component.metrics.fan_in as f64;
            if component.metrics.fan_in >= 3 && fan_in >= mean * 2.0 {
                // Saturates toward 1.0 as the outlier grows.
                let confidence = 1.0 - mean.max(0.5) / fan_in;
                matches.push(PatternMatch {
                    kind: PatternKind::Hub,
                    label: component.display_name.clone(),
                    components: vec![component.id],
                    confidence,
                });
            }
        }
        Ok(matches)
    }
}

/// Cross-component dependency cycles, reported not rejected.
struct CycleRule;

impl PatternRule for CycleRule {
    fn name(&self) -> &'static str {
        "cyclic-dependency"
    }

    fn evaluate(&self, graph: &ArchitectureGraph) -> anyhow::Result<Vec<PatternMatch>> {
        Ok(graph
            .cycles()
            .into_iter()
            .enumerate()
            .map(|(pos, components)| PatternMatch {
                kind: PatternKind::CyclicDependency,
                label: format!("cycle {}", pos + 1),
                components,
                confidence: 1.0,
            })
            .collect())
    }
}

/// Independently deployable groups: multiple disconnected clusters of
/// components, each with internal edges.
struct MicroserviceGroupRule;

impl PatternRule for MicroserviceGroupRule {
    fn name(&self) -> &'static str {
        "microservice-group"
    }

    fn evaluate(&self, graph: &ArchitectureGraph) -> anyhow::Result<Vec<PatternMatch>> {
        // Union of weakly connected components.
        let mut parent: HashMap<ComponentId, ComponentId> = graph
            .components()
            .iter()
            .map(|c| (c.id, c.id))
            .collect();

        fn find(parent: &mut HashMap<ComponentId, ComponentId>, id: ComponentId) -> ComponentId {
            let mut root = id;
            while parent[&root] != root {
                root = parent[&root];
            }
            let mut cursor = id;
            while parent[&cursor] != root {
                let next = parent[&cursor];
                parent.insert(cursor, root);
                cursor = next;
            }
            root
        }

        for edge in graph.edges() {
            let a = find(&mut parent, edge.source);
            let b = find(&mut parent, edge.target);
            if a != b {
                parent.insert(a, b);
            }
        }

        let mut groups: HashMap<ComponentId, Vec<ComponentId>> = HashMap::new();
        for component in graph.components() {
            let root = find(&mut parent, component.id);
            groups.entry(root).or_default().push(component.id);
        }

        let mut populous: Vec<Vec<ComponentId>> = groups
            .into_values()
            .filter(|members| members.len() >= 2)
            .map(|mut members| {
                members.sort();
                members
            })
            .collect();
        if populous.len() < 2 {
            return Ok(Vec::new());
        }
        populous.sort();

        let grouped: usize = populous.iter().map(|g| g.len()).sum();
        let confidence = grouped as f64 / graph.component_count() as f64;
        Ok(populous
            .into_iter()
            .enumerate()
            .map(|(pos, components)| PatternMatch {
                kind: PatternKind::MicroserviceGroup,
                label: format!("group {}", pos + 1),
                components,
                confidence,
            })
            .collect())
    }
}
