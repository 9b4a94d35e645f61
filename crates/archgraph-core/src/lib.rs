//! Archgraph Core — architecture model, graph builder, pattern rules,
//! and change impact analysis

pub mod builder;
pub mod diagnostics;
pub mod graph;
pub mod impact;
pub mod model;
pub mod patterns;
pub mod policy;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use builder::{BuildOutcome, ExternalReference, GraphBuilder};
pub use diagnostics::{Diagnostic, DiagnosticCode, GraphBuildError, ParseFailure, Severity};
pub use graph::ArchitectureGraph;
pub use impact::{ImpactAnalyzer, ImpactError};
pub use model::{
    ChangeKind, ChangeSet, Component, ComponentId, ComponentKind, ComponentMetrics, ContentHash,
    DependencyEdge, FileChange, GroupingPolicy, ImpactResult, LanguageTag, PatternKind,
    PatternMatch, Reference, RelationKind, Snapshot, SourceUnit, SymbolDecl, SymbolId, SymbolKind,
};
pub use patterns::{layer_levels, PatternDetector, PatternRule};
pub use policy::{AiPolicy, DiagramPolicy, EnginePolicy, ImpactPolicy, ParsePolicy};
