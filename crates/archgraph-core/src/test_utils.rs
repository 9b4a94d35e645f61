//! Shared builders for core tests

use std::path::PathBuf;
use std::sync::Arc;

use crate::model::*;

/// A source unit with one declared symbol and the given outgoing call
/// references, qualified the way the parser adapters do it.
pub fn unit_with_calls(path: &str, symbol: &str, calls: &[&str]) -> Arc<SourceUnit> {
    let stem = path.rsplit('/').next().unwrap().rsplit_once('.').unwrap().0;
    let qualified = format!("{stem}::{symbol}");
    let references = calls
        .iter()
        .enumerate()
        .map(|(pos, target)| Reference {
            from: qualified.clone(),
            target: (*target).to_string(),
            kind: RelationKind::Calls,
            line: pos as u32 + 2,
        })
        .collect();
    Arc::new(SourceUnit {
        path: PathBuf::from(path),
        hash: ContentHash::of(format!("{path}:{symbol}:{calls:?}").as_bytes()),
        language: "rust".to_string(),
        symbols: vec![SymbolDecl {
            name: symbol.to_string(),
            qualified_name: qualified,
            kind: SymbolKind::Function,
            line_start: 1,
            line_end: 1,
            alias: Some(symbol.to_string()),
        }],
        references,
    })
}

/// A bare component for graph-level tests.
pub fn component(key: &str, kind: ComponentKind) -> Component {
    Component {
        id: ComponentId::new(key),
        group_key: key.to_string(),
        display_name: key.to_string(),
        kind,
        members: Vec::new(),
        files: vec![PathBuf::from(format!("{key}.rs"))],
        metrics: ComponentMetrics::default(),
    }
}

pub fn edge(source: &str, target: &str, kind: RelationKind, weight: u32) -> DependencyEdge {
    DependencyEdge {
        source: ComponentId::new(source),
        target: ComponentId::new(target),
        kind,
        weight,
    }
}
