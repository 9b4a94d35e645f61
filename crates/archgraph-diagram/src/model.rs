//! Abstract diagram model, persisted across runs for incremental
//! reconciliation

use archgraph_core::{ComponentId, ComponentKind, RelationKind, Snapshot};
use serde::{Deserialize, Serialize};

/// Identifier of a diagram node, distinct from the component id: the
/// reconciler keeps it stable across regenerations while the underlying
/// component is unchanged, so unrelated re-layout never renames a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct DiagramId(pub u64);

/// Which markup form the renderer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DiagramType {
    /// Top-to-bottom flowchart with cluster subgraphs.
    #[default]
    Flowchart,
    /// Left-to-right component view.
    Component,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramNode {
    pub id: DiagramId,
    /// The component this node renders.
    pub component: ComponentId,
    pub label: String,
    pub kind: ComponentKind,
    /// Cluster the node belongs to, if any.
    pub cluster: Option<String>,
    /// Top-to-bottom layering order hint.
    pub layer: u32,
    /// Carried over from the prior model where feasible, to minimize
    /// unrelated visual movement.
    pub position: Option<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub source: DiagramId,
    pub target: DiagramId,
    pub kind: RelationKind,
    pub weight: u32,
}

/// Named group of nodes sharing a cluster-eligible pattern match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramCluster {
    pub name: String,
    pub nodes: Vec<DiagramId>,
}

/// Nodes, edges, and clusters for one diagram, plus the allocation
/// counter for fresh stable ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramModel {
    pub snapshot: Snapshot,
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
    pub clusters: Vec<DiagramCluster>,
    /// Next unallocated diagram id. Persisted so ids never recycle
    /// within a project's diagram history.
    pub next_diagram_id: u64,
}

impl DiagramModel {
    pub fn empty(snapshot: Snapshot) -> Self {
        DiagramModel {
            snapshot,
            nodes: Vec::new(),
            edges: Vec::new(),
            clusters: Vec::new(),
            next_diagram_id: 1,
        }
    }

    pub fn node_by_component(&self, component: ComponentId) -> Option<&DiagramNode> {
        self.nodes.iter().find(|n| n.component == component)
    }

    pub fn allocate_id(&mut self) -> DiagramId {
        let id = DiagramId(self.next_diagram_id);
        self.next_diagram_id += 1;
        id
    }
}

/// Restricts diagram building to a subset of components on incremental
/// runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DiagramScope {
    #[default]
    All,
    Components(std::collections::HashSet<ComponentId>),
}

impl DiagramScope {
    pub fn includes(&self, id: ComponentId) -> bool {
        match self {
            DiagramScope::All => true,
            DiagramScope::Components(set) => set.contains(&id),
        }
    }
}

