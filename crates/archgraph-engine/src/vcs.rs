//! Version-control collaborator boundary
//!
//! The engine performs no repository I/O itself; file listings, file
//! content, and commit diffs come through this trait. Errors separate
//! not-found from transient so callers can decide abort vs retry.

use std::path::{Path, PathBuf};

use archgraph_core::ChangeSet;
use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    /// The project, ref, or path does not exist. Retrying won't help.
    #[error("not found: {0}")]
    NotFound(String),
    /// A temporary failure (network, lock contention). Worth retrying.
    #[error("transient failure: {0}")]
    Transient(#[source] anyhow::Error),
    /// The collaborator cannot answer this request at all, e.g. a local
    /// working tree asked for a commit diff.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

#[async_trait::async_trait]
pub trait VersionControl: Send + Sync {
    /// All analyzable file paths at a ref, relative to the repo root.
    async fn list_files(&self, project: &str, reference: &str) -> Result<Vec<PathBuf>, VcsError>;

    /// Raw bytes of one file at a ref.
    async fn file_content(
        &self,
        project: &str,
        reference: &str,
        path: &Path,
    ) -> Result<Vec<u8>, VcsError>;

    /// File changes between two refs.
    async fn diff(
        &self,
        project: &str,
        from_ref: &str,
        to_ref: &str,
    ) -> Result<ChangeSet, VcsError>;
}

/// Path filters recovered from the analysis request surface: include
/// and exclude globs plus an optional language allow-list.
#[derive(Debug, Clone, Default)]
pub struct PathFilters {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub languages: Vec<String>,
}

impl PathFilters {
    fn build(globs: &[String]) -> anyhow::Result<Option<GlobSet>> {
        if globs.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in globs {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Some(builder.build()?))
    }
}

/// Local working-tree repository for the CLI and tests. Walks with the
/// ignore crate so .gitignore rules hold, then applies the request's
/// include/exclude globs and language allow-list.
pub struct LocalRepository {
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    languages: Vec<String>,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>, filters: &PathFilters) -> anyhow::Result<Self> {
        Ok(LocalRepository {
            root: root.into(),
            include: PathFilters::build(&filters.include)?,
            exclude: PathFilters::build(&filters.exclude)?,
            languages: filters.languages.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, relative: &Path) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(relative) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(relative) {
                return false;
            }
        }
        if !self.languages.is_empty() {
            match archgraph_parser::tag_for_path(relative) {
                Some(tag) => self.languages.iter().any(|l| l == tag),
                None => false,
            }
        } else {
            true
        }
    }
}

#[async_trait::async_trait]
impl VersionControl for LocalRepository {
    async fn list_files(&self, _project: &str, _reference: &str) -> Result<Vec<PathBuf>, VcsError> {
        if !self.root.exists() {
            return Err(VcsError::NotFound(self.root.display().to_string()));
        }
        let mut files = Vec::new();
        for entry in ignore::WalkBuilder::new(&self.root).hidden(true).build() {
            let entry = entry.map_err(|e| VcsError::Transient(e.into()))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_path_buf();
            if self.accepts(&relative) {
                files.push(relative);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn file_content(
        &self,
        _project: &str,
        _reference: &str,
        path: &Path,
    ) -> Result<Vec<u8>, VcsError> {
        let full = self.root.join(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VcsError::NotFound(full.display().to_string()))
            }
            Err(e) => Err(VcsError::Transient(e.into())),
        }
    }

    /// A working tree has no second ref to diff against; the engine
    /// falls back to manifest comparison against the prior snapshot.
    async fn diff(
        &self,
        _project: &str,
        _from_ref: &str,
        _to_ref: &str,
    ) -> Result<ChangeSet, VcsError> {
        Err(VcsError::Unsupported(
            "local working tree cannot diff two refs",
        ))
    }
}
