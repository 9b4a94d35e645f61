//! OpenRouter-backed diagram styler

use anyhow::{Context, Result};
use archgraph_diagram::{DiagramModel, DiagramType};
use serde::{Deserialize, Serialize};

use crate::prompt::{styling_prompt, STYLING_SYSTEM_PROMPT};
use crate::styler::DiagramStyler;

pub struct OpenRouterStyler {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterStyler {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .unwrap_or_default();
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// OpenAI-compatible wire format, as OpenRouter speaks it.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait::async_trait]
impl DiagramStyler for OpenRouterStyler {
    async fn style(
        &self,
        model: &DiagramModel,
        diagram_type: DiagramType,
        deterministic: &str,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: STYLING_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: styling_prompt(model, diagram_type, deterministic),
                },
            ],
            temperature: 0.1,
            max_tokens: 4000,
        };

        let response = self
            .client
            .post("https://openrouter.ai/api/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("failed to send request to OpenRouter")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouter API error: {error_text}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to parse OpenRouter response")?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim())
            .context("OpenRouter response had no choices")?;

        Ok(strip_code_fence(content).to_string())
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

/// Models wrap markup in ```mermaid fences despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("mermaid").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(rest)
}

#[cfg(test)]
mod fence_tests {
    use super::strip_code_fence;

    #[test]
    fn plain_markup_passes_through() {
        assert_eq!(strip_code_fence("flowchart TD"), "flowchart TD");
    }

    #[test]
    fn mermaid_fences_are_stripped() {
        let fenced = "```mermaid\nflowchart TD\n    a --> b\n```";
        assert_eq!(strip_code_fence(fenced), "flowchart TD\n    a --> b");
    }

    #[test]
    fn bare_fences_are_stripped() {
        let fenced = "```\nflowchart TD\n```";
        assert_eq!(strip_code_fence(fenced), "flowchart TD");
    }
}
