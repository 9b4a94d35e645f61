//! Engine tuning knobs with documented defaults
//!
//! Decay factors, hop limits, and regeneration thresholds are policy,
//! not algorithm: they load from `archgraph.toml` when present and fall
//! back to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::GroupingPolicy;

/// Impact propagation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactPolicy {
    /// Score multiplier per hop away from a directly touched component.
    pub decay: f64,
    /// Maximum hops to propagate.
    pub hop_limit: u32,
    /// Components scoring below this are excluded from the result.
    pub min_score: f64,
    /// When more than this fraction of components is affected, recommend
    /// full regeneration over incremental update.
    pub full_regeneration_fraction: f64,
    /// Wall-clock budget for one impact computation, in milliseconds.
    pub deadline_ms: u64,
}

impl Default for ImpactPolicy {
    fn default() -> Self {
        ImpactPolicy {
            decay: 0.5,
            hop_limit: 3,
            min_score: 0.05,
            full_regeneration_fraction: 0.5,
            deadline_ms: 5_000,
        }
    }
}

impl ImpactPolicy {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Diagram projection and reconciliation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramPolicy {
    /// Minimum edge weight to appear in a diagram. Cross-cluster edges
    /// are always kept regardless of weight.
    pub edge_visibility_threshold: u32,
    /// When more than this fraction of new nodes has no prior match,
    /// reconciliation falls back to a full layout.
    pub regeneration_fraction: f64,
}

impl Default for DiagramPolicy {
    fn default() -> Self {
        DiagramPolicy {
            edge_visibility_threshold: 2,
            regeneration_fraction: 0.4,
        }
    }
}

/// Parsing and symbol store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsePolicy {
    /// Per-file parse deadline, in milliseconds. A slow parse becomes a
    /// timeout ParseError without blocking the run.
    pub file_timeout_ms: u64,
    /// Parser worker threads. 0 means available parallelism.
    pub workers: usize,
    /// Maximum cached source units before LRU eviction.
    pub store_capacity: usize,
}

impl Default for ParsePolicy {
    fn default() -> Self {
        ParsePolicy {
            file_timeout_ms: 10_000,
            workers: 0,
            store_capacity: 4_096,
        }
    }
}

impl ParsePolicy {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_millis(self.file_timeout_ms)
    }

    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get().max(2))
                .unwrap_or(2)
        }
    }
}

/// AI styling collaborator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiPolicy {
    pub enabled: bool,
    /// Styling request deadline, in milliseconds.
    pub timeout_ms: u64,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open, in milliseconds.
    pub cooldown_ms: u64,
    pub model: String,
}

impl Default for AiPolicy {
    fn default() -> Self {
        AiPolicy {
            enabled: true,
            timeout_ms: 20_000,
            failure_threshold: 3,
            cooldown_ms: 60_000,
            model: "anthropic/claude-3-haiku-20240307".to_string(),
        }
    }
}

impl AiPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Top-level engine policy, loadable from `archgraph.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EnginePolicy {
    pub grouping: GroupingPolicy,
    pub impact: ImpactPolicy,
    pub diagram: DiagramPolicy,
    pub parse: ParsePolicy,
    pub ai: AiPolicy,
}

impl EnginePolicy {
    /// Load from a TOML file, falling back to defaults when the file is
    /// absent. A present-but-invalid file is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(EnginePolicy::default());
        }
        let text = std::fs::read_to_string(path)?;
        let policy = toml::from_str(&text)?;
        Ok(policy)
    }
}
