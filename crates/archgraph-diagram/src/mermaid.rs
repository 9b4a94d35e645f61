//! Deterministic Mermaid rendering of a diagram model
//!
//! This is the engine-owned fallback path: it emits valid Mermaid
//! markup with no collaborator involved. The AI styling layer decorates
//! this output and is never the only way to produce a diagram.

use std::fmt::Write;

use archgraph_core::{ComponentKind, RelationKind};

use crate::model::{DiagramModel, DiagramNode, DiagramType};

/// Render a model as Mermaid markup. Output ordering follows the
/// model's node and edge order, so identical models render identically.
pub fn render(model: &DiagramModel, diagram_type: DiagramType) -> String {
    let mut out = String::new();
    let header = match diagram_type {
        DiagramType::Flowchart => "flowchart TD",
        DiagramType::Component => "flowchart LR",
    };
    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "    %% {}", model.snapshot);

    let mut ordered: Vec<&DiagramNode> = model.nodes.iter().collect();
    ordered.sort_by_key(|n| (n.layer, n.id));

    // Clustered nodes render inside their subgraph blocks.
    for (pos, cluster) in model.clusters.iter().enumerate() {
        let _ = writeln!(out, "    subgraph cluster_{pos}[\"{}\"]", escape(&cluster.name));
        for node in ordered.iter().filter(|n| cluster.nodes.contains(&n.id)) {
            let _ = writeln!(out, "        {}", node_line(node));
        }
        let _ = writeln!(out, "    end");
    }
    for node in ordered.iter().filter(|n| n.cluster.is_none()) {
        let _ = writeln!(out, "    {}", node_line(node));
    }

    for edge in &model.edges {
        let label = match edge.weight {
            0 | 1 => relation_label(edge.kind).to_string(),
            n => format!("{} x{n}", relation_label(edge.kind)),
        };
        let _ = writeln!(
            out,
            "    n{} -->|{label}| n{}",
            edge.source.0, edge.target.0
        );
    }

    out
}

fn node_line(node: &DiagramNode) -> String {
    let label = escape(&node.label);
    match node.kind {
        // Data stores get the cylinder shape, entries the stadium.
        ComponentKind::Data => format!("n{}[(\"{label}\")]", node.id.0),
        ComponentKind::Entry => format!("n{}([\"{label}\"])", node.id.0),
        _ => format!("n{}[\"{label}\"]", node.id.0),
    }
}

fn relation_label(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Calls => "calls",
        RelationKind::Imports => "imports",
        RelationKind::Extends => "extends",
        RelationKind::Composes => "composes",
    }
}

fn escape(label: &str) -> String {
    label.replace('"', "'")
}

/// Structural self-check on rendered markup: a known header and
/// balanced brackets. The renderer's own output always passes; the AI
/// styling decorator runs the same check before trusting a response.
pub fn looks_valid(markup: &str) -> bool {
    let mut lines = markup.lines().filter(|l| !l.trim().is_empty());
    let Some(first) = lines.next() else {
        return false;
    };
    let first = first.trim().to_lowercase();
    if !(first.starts_with("flowchart") || first.starts_with("graph")) {
        return false;
    }

    let mut paren: i32 = 0;
    let mut bracket: i32 = 0;
    let mut in_string = false;
    for ch in markup.chars() {
        if in_string {
            if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' => paren += 1,
            ')' => paren -= 1,
            '[' => bracket += 1,
            ']' => bracket -= 1,
            _ => {}
        }
        if paren < 0 || bracket < 0 {
            return false;
        }
    }
    paren == 0 && bracket == 0 && !in_string
}
