//! AI styling collaborator contract

use anyhow::Result;
use archgraph_diagram::{DiagramModel, DiagramType};

/// A collaborator that turns a diagram model into styled diagram
/// markup. Implementations live behind the network; the engine never
/// depends on one being available — see [`crate::renderer`].
#[async_trait::async_trait]
pub trait DiagramStyler: Send + Sync {
    /// Produce styled Mermaid markup for the model. The `deterministic`
    /// argument is the engine's own rendering, handed over as the
    /// starting point so the collaborator restyles rather than invents.
    async fn style(
        &self,
        model: &DiagramModel,
        diagram_type: DiagramType,
        deterministic: &str,
    ) -> Result<String>;

    fn name(&self) -> &str;
}
