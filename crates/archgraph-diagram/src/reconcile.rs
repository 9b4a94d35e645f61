//! Merges a freshly built diagram model with the previously persisted
//! one, preserving stable ids and minimizing visual churn

use std::collections::HashMap;

use archgraph_core::policy::DiagramPolicy;

use crate::model::{DiagramId, DiagramModel};

/// How the reconciler arrived at the returned model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// No prior model existed; the new model stands as built.
    Initial,
    /// Matched nodes kept their prior ids and positions.
    Incremental,
    /// Too many unmatched nodes; full re-layout.
    Regenerated,
}

pub struct Reconciler {
    policy: DiagramPolicy,
}

impl Reconciler {
    pub fn new(policy: DiagramPolicy) -> Self {
        Reconciler { policy }
    }

    /// Reconcile `new` against `prior`. A new node matches a prior node
    /// when their underlying component ids are equal; matched nodes keep
    /// the prior stable diagram id and position hint. Unmatched new
    /// nodes get freshly allocated ids, prior-only nodes disappear, and
    /// edges are remapped onto the final id set.
    ///
    /// Without a prior model, or when the unmatched fraction exceeds the
    /// regeneration threshold, the new model is returned with a full
    /// layout instead of incremental placement.
    pub fn reconcile(
        &self,
        mut new: DiagramModel,
        prior: Option<&DiagramModel>,
    ) -> (DiagramModel, ReconcileMode) {
        let Some(prior) = prior else {
            return (new, ReconcileMode::Initial);
        };

        // Ids must never recycle within a project, regeneration or not.
        new.next_diagram_id = new.next_diagram_id.max(prior.next_diagram_id);

        let matched = new
            .nodes
            .iter()
            .filter(|n| prior.node_by_component(n.component).is_some())
            .count();
        let unmatched_fraction = if new.nodes.is_empty() {
            0.0
        } else {
            (new.nodes.len() - matched) as f64 / new.nodes.len() as f64
        };
        if unmatched_fraction > self.policy.regeneration_fraction {
            tracing::info!(
                unmatched_fraction,
                threshold = self.policy.regeneration_fraction,
                "diagram regeneration threshold crossed, full re-layout"
            );
            let remap = self.allocate_all(&mut new);
            remap_edges(&mut new, &remap);
            return (new, ReconcileMode::Regenerated);
        }

        let mut remap: HashMap<DiagramId, DiagramId> = HashMap::new();
        let mut fresh = Vec::new();
        for node in &new.nodes {
            match prior.node_by_component(node.component) {
                Some(prior_node) => {
                    remap.insert(node.id, prior_node.id);
                }
                None => fresh.push(node.id),
            }
        }
        // Allocation counter continues past both models.
        let mut next = new.next_diagram_id;
        for id in fresh {
            remap.insert(id, DiagramId(next));
            next += 1;
        }
        new.next_diagram_id = next;

        for node in &mut new.nodes {
            let final_id = remap[&node.id];
            if let Some(prior_node) = prior.node_by_component(node.component) {
                if node.position.is_none() {
                    node.position = prior_node.position;
                }
            }
            node.id = final_id;
        }
        remap_edges(&mut new, &remap);

        (new, ReconcileMode::Incremental)
    }

    /// Fresh ids for every node, continuing the persisted counter.
    fn allocate_all(&self, model: &mut DiagramModel) -> HashMap<DiagramId, DiagramId> {
        let mut remap = HashMap::new();
        let mut next = model.next_diagram_id;
        for node in &mut model.nodes {
            let id = DiagramId(next);
            next += 1;
            remap.insert(node.id, id);
            node.id = id;
            node.position = None;
        }
        model.next_diagram_id = next;
        remap
    }
}

fn remap_edges(model: &mut DiagramModel, remap: &HashMap<DiagramId, DiagramId>) {
    for edge in &mut model.edges {
        edge.source = remap[&edge.source];
        edge.target = remap[&edge.target];
    }
    for cluster in &mut model.clusters {
        for id in &mut cluster.nodes {
            *id = remap[id];
        }
        cluster.nodes.sort();
    }
}
