//! Persistence collaborator: snapshot graphs and diagram models
//!
//! A key-value contract: graphs store per (project, commit), diagram
//! models per project. A store failure is surfaced as a diagnostic and
//! the computed result is still returned in memory.

use std::path::{Path, PathBuf};

use archgraph_core::{ArchitectureGraph, ContentHash, Snapshot};
use archgraph_diagram::DiagramModel;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cache directory: .archgraph/
pub const CACHE_DIR: &str = ".archgraph";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("graph encoding failure: {0}")]
    Encoding(String),
}

/// Everything persisted for one analyzed snapshot. The manifest maps
/// each analyzed file to its content hash so a later run can derive a
/// change set without a collaborator diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot: Snapshot,
    pub graph: ArchitectureGraph,
    pub manifest: Vec<(PathBuf, ContentHash)>,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put_graph(&self, record: &SnapshotRecord) -> Result<(), PersistError>;
    async fn get_graph(&self, snapshot: &Snapshot) -> Result<Option<SnapshotRecord>, PersistError>;
    async fn delete_graph(&self, snapshot: &Snapshot) -> Result<(), PersistError>;

    async fn put_diagram(&self, project: &str, model: &DiagramModel) -> Result<(), PersistError>;
    async fn get_diagram(&self, project: &str) -> Result<Option<DiagramModel>, PersistError>;
    async fn delete_diagram(&self, project: &str) -> Result<(), PersistError>;
}

/// Filesystem store under `.archgraph/`: bincode for graph records,
/// JSON for diagram models (hand-inspectable, mutated in place by the
/// reconciler between runs).
pub struct FsStore {
    base: PathBuf,
}

impl FsStore {
    pub fn new(root: &Path) -> Self {
        FsStore {
            base: root.join(CACHE_DIR),
        }
    }

    fn graph_path(&self, snapshot: &Snapshot) -> PathBuf {
        self.base
            .join("graphs")
            .join(format!("{}-{}.bin", sanitize(&snapshot.project), sanitize(&snapshot.commit)))
    }

    fn diagram_path(&self, project: &str) -> PathBuf {
        self.base
            .join("diagrams")
            .join(format!("{}.json", sanitize(project)))
    }

    fn ensure_dirs(&self) -> Result<(), PersistError> {
        std::fs::create_dir_all(self.base.join("graphs"))?;
        std::fs::create_dir_all(self.base.join("diagrams"))?;
        Ok(())
    }

    /// Remove the whole cache directory.
    pub fn clear(&self) -> Result<(), PersistError> {
        if self.base.exists() {
            std::fs::remove_dir_all(&self.base)?;
        }
        Ok(())
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

#[async_trait::async_trait]
impl SnapshotStore for FsStore {
    async fn put_graph(&self, record: &SnapshotRecord) -> Result<(), PersistError> {
        self.ensure_dirs()?;
        let bytes =
            bincode::serialize(record).map_err(|e| PersistError::Encoding(e.to_string()))?;
        let path = self.graph_path(&record.snapshot);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!("graph snapshot saved: {}", path.display());
        Ok(())
    }

    async fn get_graph(&self, snapshot: &Snapshot) -> Result<Option<SnapshotRecord>, PersistError> {
        let path = self.graph_path(snapshot);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        let mut record: SnapshotRecord =
            bincode::deserialize(&bytes).map_err(|e| PersistError::Encoding(e.to_string()))?;
        record.graph.reindex();
        Ok(Some(record))
    }

    async fn delete_graph(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let path = self.graph_path(snapshot);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn put_diagram(&self, project: &str, model: &DiagramModel) -> Result<(), PersistError> {
        self.ensure_dirs()?;
        let json = serde_json::to_string_pretty(model)
            .map_err(|e| PersistError::Encoding(e.to_string()))?;
        tokio::fs::write(self.diagram_path(project), json).await?;
        Ok(())
    }

    async fn get_diagram(&self, project: &str) -> Result<Option<DiagramModel>, PersistError> {
        let path = self.diagram_path(project);
        if !path.exists() {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&path).await?;
        let model =
            serde_json::from_str(&json).map_err(|e| PersistError::Encoding(e.to_string()))?;
        Ok(Some(model))
    }

    async fn delete_diagram(&self, project: &str) -> Result<(), PersistError> {
        let path = self.diagram_path(project);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    graphs: DashMap<Snapshot, SnapshotRecord>,
    diagrams: DashMap<String, DiagramModel>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStore {
    async fn put_graph(&self, record: &SnapshotRecord) -> Result<(), PersistError> {
        self.graphs.insert(record.snapshot.clone(), record.clone());
        Ok(())
    }

    async fn get_graph(&self, snapshot: &Snapshot) -> Result<Option<SnapshotRecord>, PersistError> {
        Ok(self.graphs.get(snapshot).map(|r| r.clone()))
    }

    async fn delete_graph(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        self.graphs.remove(snapshot);
        Ok(())
    }

    async fn put_diagram(&self, project: &str, model: &DiagramModel) -> Result<(), PersistError> {
        self.diagrams.insert(project.to_string(), model.clone());
        Ok(())
    }

    async fn get_diagram(&self, project: &str) -> Result<Option<DiagramModel>, PersistError> {
        Ok(self.diagrams.get(project).map(|m| m.clone()))
    }

    async fn delete_diagram(&self, project: &str) -> Result<(), PersistError> {
        self.diagrams.remove(project);
        Ok(())
    }
}
