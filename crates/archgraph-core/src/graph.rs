//! Architecture graph for one snapshot, with a petgraph projection for
//! traversal algorithms

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};

use crate::diagnostics::GraphBuildError;
use crate::model::{Component, ComponentId, DependencyEdge, RelationKind};

/// Components and dependency edges for one snapshot.
///
/// Invariants, checked by [`ArchitectureGraph::new`]: component ids are
/// unique, and every edge references component ids present in the
/// graph. Cycles are a valid data shape; they are detected and flagged
/// in component metrics, never rejected.
///
/// Component and edge ordering is part of the type's contract: builders
/// must hand over vectors in the total order (group key, then kind) so
/// repeated runs over the same units produce identical output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureGraph {
    components: Vec<Component>,
    edges: Vec<DependencyEdge>,
    /// id → position, rebuilt on deserialization via [`Self::reindex`].
    #[serde(skip)]
    index: HashMap<ComponentId, usize>,
}

impl PartialEq for ArchitectureGraph {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components && self.edges == other.edges
    }
}

impl ArchitectureGraph {
    /// Assemble a graph, validating its invariants.
    pub fn new(
        components: Vec<Component>,
        edges: Vec<DependencyEdge>,
    ) -> Result<Self, GraphBuildError> {
        let mut index = HashMap::with_capacity(components.len());
        for (pos, component) in components.iter().enumerate() {
            if index.insert(component.id, pos).is_some() {
                return Err(GraphBuildError::DuplicateComponent {
                    group_key: component.group_key.clone(),
                });
            }
        }
        for edge in &edges {
            for endpoint in [edge.source, edge.target] {
                if !index.contains_key(&endpoint) {
                    return Err(GraphBuildError::DanglingEdge {
                        from: edge.source,
                        target: edge.target,
                    });
                }
            }
        }
        Ok(ArchitectureGraph {
            components,
            edges,
            index,
        })
    }

    /// Rebuild the id index after deserialization.
    pub fn reindex(&mut self) {
        self.index = self
            .components
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.id, pos))
            .collect();
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.index.get(&id).map(|&pos| &self.components[pos])
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        let pos = *self.index.get(&id)?;
        Some(&mut self.components[pos])
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn edges_from(&self, source: ComponentId) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(move |e| e.source == source)
    }

    pub fn edges_to(&self, target: ComponentId) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(move |e| e.target == target)
    }

    /// Neighbors in both directions, for undirected traversal.
    pub fn neighbors(&self, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
        self.edges.iter().filter_map(move |e| {
            if e.source == id {
                Some(e.target)
            } else if e.target == id {
                Some(e.source)
            } else {
                None
            }
        })
    }

    pub fn has_edge_between(
        &self,
        source: ComponentId,
        target: ComponentId,
        kind: RelationKind,
    ) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.kind == kind)
    }

    pub fn find_by_group_key(&self, group_key: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.group_key == group_key)
    }

    /// Project into a petgraph [`StableDiGraph`] for traversal
    /// algorithms. Returns the projection plus the id ↔ index mapping.
    pub fn to_petgraph(&self) -> GraphProjection<'_> {
        let mut inner: StableDiGraph<ComponentId, &DependencyEdge> = StableDiGraph::new();
        let mut indices = HashMap::with_capacity(self.components.len());
        for component in &self.components {
            let idx = inner.add_node(component.id);
            indices.insert(component.id, idx);
        }
        for edge in &self.edges {
            inner.add_edge(indices[&edge.source], indices[&edge.target], edge);
        }
        GraphProjection { inner, indices }
    }

    /// Strongly connected components of size ≥ 2, i.e. cross-component
    /// dependency cycles. Members are returned in graph order.
    pub fn cycles(&self) -> Vec<Vec<ComponentId>> {
        let projection = self.to_petgraph();
        let mut cycles: Vec<Vec<ComponentId>> = tarjan_scc(&projection.inner)
            .into_iter()
            .filter(|scc| scc.len() >= 2)
            .map(|scc| {
                let mut members: Vec<ComponentId> =
                    scc.iter().map(|&idx| projection.inner[idx]).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// Petgraph view over an [`ArchitectureGraph`].
pub struct GraphProjection<'g> {
    pub inner: StableDiGraph<ComponentId, &'g DependencyEdge>,
    pub indices: HashMap<ComponentId, NodeIndex>,
}
