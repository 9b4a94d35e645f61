//! Archgraph Diagram — diagram model, incremental reconciler, and the
//! deterministic Mermaid renderer

pub mod builder;
pub mod mermaid;
pub mod model;
pub mod reconcile;

#[cfg(test)]
pub mod tests;

pub use builder::DiagramBuilder;
pub use model::{
    DiagramCluster, DiagramEdge, DiagramId, DiagramModel, DiagramNode, DiagramScope, DiagramType,
};
pub use reconcile::{ReconcileMode, Reconciler};
