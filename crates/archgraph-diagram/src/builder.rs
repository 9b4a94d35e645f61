//! Projects an architecture graph and its pattern matches into a
//! diagram model

use std::collections::{HashMap, HashSet};

use archgraph_core::policy::DiagramPolicy;
use archgraph_core::{ArchitectureGraph, ComponentId, PatternMatch, Snapshot};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::DiGraph;

use crate::model::{
    DiagramCluster, DiagramEdge, DiagramModel, DiagramNode, DiagramScope,
};

/// Builds a fresh [`DiagramModel`] from a graph. Node ids are allocated
/// sequentially in graph order; the reconciler re-maps them against the
/// prior model afterwards.
pub struct DiagramBuilder {
    policy: DiagramPolicy,
}

impl DiagramBuilder {
    pub fn new(policy: DiagramPolicy) -> Self {
        DiagramBuilder { policy }
    }

    pub fn build(
        &self,
        snapshot: Snapshot,
        graph: &ArchitectureGraph,
        matches: &[PatternMatch],
        scope: &DiagramScope,
    ) -> DiagramModel {
        let mut model = DiagramModel::empty(snapshot);

        let in_scope: Vec<&archgraph_core::Component> = graph
            .components()
            .iter()
            .filter(|c| scope.includes(c.id))
            .collect();

        // Cluster assignment: first cluster-eligible match wins, in
        // detection order, so assignment is deterministic.
        let mut cluster_of: HashMap<ComponentId, String> = HashMap::new();
        for m in matches.iter().filter(|m| m.kind.cluster_eligible()) {
            for &component in &m.components {
                cluster_of.entry(component).or_insert_with(|| m.label.clone());
            }
        }

        let layers = layout_layers(graph, &in_scope);

        let mut node_ids: HashMap<ComponentId, crate::model::DiagramId> = HashMap::new();
        for component in &in_scope {
            let id = model.allocate_id();
            node_ids.insert(component.id, id);
            model.nodes.push(DiagramNode {
                id,
                component: component.id,
                label: component.display_name.clone(),
                kind: component.kind,
                cluster: cluster_of.get(&component.id).cloned(),
                layer: layers.get(&component.id).copied().unwrap_or(0),
                position: None,
            });
        }

        // Edge survives on weight, or unconditionally when it crosses a
        // cluster boundary: those carry the architectural meaning.
        for edge in graph.edges() {
            let (Some(&source), Some(&target)) =
                (node_ids.get(&edge.source), node_ids.get(&edge.target))
            else {
                continue;
            };
            let crosses = cluster_of.get(&edge.source) != cluster_of.get(&edge.target);
            if edge.weight >= self.policy.edge_visibility_threshold || crosses {
                model.edges.push(DiagramEdge {
                    source,
                    target,
                    kind: edge.kind,
                    weight: edge.weight,
                });
            }
        }

        let mut clusters: HashMap<String, Vec<crate::model::DiagramId>> = HashMap::new();
        for node in &model.nodes {
            if let Some(cluster) = &node.cluster {
                clusters.entry(cluster.clone()).or_default().push(node.id);
            }
        }
        let mut named: Vec<DiagramCluster> = clusters
            .into_iter()
            .map(|(name, mut nodes)| {
                nodes.sort();
                DiagramCluster { name, nodes }
            })
            .collect();
        named.sort_by(|a, b| a.name.cmp(&b.name));
        model.clusters = named;

        tracing::debug!(
            nodes = model.nodes.len(),
            edges = model.edges.len(),
            clusters = model.clusters.len(),
            "diagram model built"
        );
        model
    }
}

/// Top-to-bottom layering from topological order over the acyclic
/// projection. Cycles are broken for layout only — the lowest-weight
/// edge inside each strongly connected component is dropped, repeatedly,
/// until the projection is acyclic. The stored graph keeps its cycles.
fn layout_layers(
    graph: &ArchitectureGraph,
    in_scope: &[&archgraph_core::Component],
) -> HashMap<ComponentId, u32> {
    let scope_ids: HashSet<ComponentId> = in_scope.iter().map(|c| c.id).collect();

    let mut projection: DiGraph<ComponentId, u32> = DiGraph::new();
    let mut indices = HashMap::new();
    for &component in in_scope {
        indices.insert(component.id, projection.add_node(component.id));
    }
    for edge in graph.edges() {
        if scope_ids.contains(&edge.source) && scope_ids.contains(&edge.target) {
            projection.add_edge(indices[&edge.source], indices[&edge.target], edge.weight);
        }
    }

    loop {
        let cyclic: Vec<Vec<petgraph::graph::NodeIndex>> = tarjan_scc(&projection)
            .into_iter()
            .filter(|scc| scc.len() >= 2)
            .collect();
        if cyclic.is_empty() {
            break;
        }
        for scc in cyclic {
            let members: HashSet<_> = scc.iter().copied().collect();
            let victim = projection
                .edge_indices()
                .filter(|&e| {
                    let (s, t) = projection.edge_endpoints(e).unwrap();
                    members.contains(&s) && members.contains(&t)
                })
                .min_by_key(|&e| (projection[e], e.index()));
            if let Some(edge) = victim {
                projection.remove_edge(edge);
            }
        }
    }

    let order = toposort(&projection, None).expect("cycles were broken above");
    let mut levels: HashMap<petgraph::graph::NodeIndex, u32> = HashMap::new();
    let mut layers = HashMap::new();
    for idx in order {
        let level = projection
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|pred| levels.get(&pred))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        levels.insert(idx, level);
        layers.insert(projection[idx], level);
    }
    layers
}

