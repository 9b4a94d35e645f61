//! Change impact propagation over a prior architecture graph

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;

use crate::graph::ArchitectureGraph;
use crate::model::{ChangeKind, ChangeSet, ComponentId, ImpactResult};
use crate::policy::ImpactPolicy;

#[derive(Debug, Error)]
pub enum ImpactError {
    /// The deadline elapsed mid-propagation. Callers fall back to full
    /// regeneration.
    #[error("impact computation exceeded its {0} ms deadline")]
    Timeout(u64),
}

/// Computes which components a change set affects and how severely.
pub struct ImpactAnalyzer {
    policy: ImpactPolicy,
}

impl ImpactAnalyzer {
    pub fn new(policy: ImpactPolicy) -> Self {
        ImpactAnalyzer { policy }
    }

    /// Map a change set onto the prior graph and propagate impact by
    /// breadth-first traversal over both edge directions.
    ///
    /// Directly touched components score 1.0; each hop multiplies by
    /// the decay factor; a component reached via multiple paths keeps
    /// its maximum score. Deleted files map through the prior snapshot's
    /// file-to-component assignment, which is the only mapping they
    /// still have.
    pub fn impact(
        &self,
        changes: &ChangeSet,
        prior: &ArchitectureGraph,
    ) -> Result<ImpactResult, ImpactError> {
        let started = Instant::now();

        // Prior snapshot's file → component assignment.
        let mut by_file: HashMap<&PathBuf, ComponentId> = HashMap::new();
        for component in prior.components() {
            for file in &component.files {
                by_file.insert(file, component.id);
            }
        }

        let mut directly_touched: Vec<ComponentId> = Vec::new();
        for change in &changes.changes {
            let mut touch = |path: &PathBuf| {
                if let Some(&id) = by_file.get(path) {
                    if !directly_touched.contains(&id) {
                        directly_touched.push(id);
                    }
                }
            };
            touch(&change.path);
            if let ChangeKind::Renamed { from } = &change.kind {
                touch(from);
            }
        }
        directly_touched.sort();

        let mut scores: BTreeMap<ComponentId, f64> = BTreeMap::new();
        let mut queue: VecDeque<(ComponentId, u32, f64)> = VecDeque::new();
        for &id in &directly_touched {
            scores.insert(id, 1.0);
            queue.push_back((id, 0, 1.0));
        }

        while let Some((id, hops, score)) = queue.pop_front() {
            if started.elapsed() > self.policy.deadline() {
                return Err(ImpactError::Timeout(self.policy.deadline_ms));
            }
            if hops >= self.policy.hop_limit {
                continue;
            }
            let next_score = score * self.policy.decay;
            if next_score < self.policy.min_score {
                continue;
            }
            for neighbor in prior.neighbors(id) {
                let known = scores.get(&neighbor).copied().unwrap_or(0.0);
                if next_score > known {
                    scores.insert(neighbor, next_score);
                    queue.push_back((neighbor, hops + 1, next_score));
                }
            }
        }

        scores.retain(|_, s| *s >= self.policy.min_score);

        let total = prior.component_count().max(1);
        let touched_fraction = scores.len() as f64 / total as f64;
        let full_regeneration_recommended =
            touched_fraction > self.policy.full_regeneration_fraction;

        tracing::debug!(
            touched = directly_touched.len(),
            affected = scores.len(),
            touched_fraction,
            "impact propagation complete"
        );

        Ok(ImpactResult {
            directly_touched,
            scores,
            full_regeneration_recommended,
        })
    }
}
