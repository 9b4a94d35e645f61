//! Prompt templates for diagram styling

use archgraph_diagram::{DiagramModel, DiagramType};

pub const STYLING_SYSTEM_PROMPT: &str = r#"You are an expert at software architecture diagrams. Your role is to:

1. Restyle the provided Mermaid diagram without changing its structure
2. Keep every node id and edge exactly as given
3. Add classDef styling, meaningful colors per component kind, and clearer labels
4. Return only the Mermaid markup, no prose, no code fences"#;

/// Build the styling prompt around the deterministic rendering.
pub fn styling_prompt(
    model: &DiagramModel,
    diagram_type: DiagramType,
    deterministic: &str,
) -> String {
    let kinds = model
        .nodes
        .iter()
        .map(|n| format!("- n{}: {} ({:?})", n.id.0, n.label, n.kind))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Restyle this {} architecture diagram for snapshot {}.

Node roles:
{}

Current Mermaid markup:
{}

Apply visual styling (classDef, colors by role, stroke emphasis on heavy edges) while keeping every node id, label, edge, and subgraph exactly as they are. Respond with Mermaid markup only."#,
        match diagram_type {
            DiagramType::Flowchart => "top-down flowchart",
            DiagramType::Component => "component",
        },
        model.snapshot,
        kinds,
        deterministic,
    )
}
