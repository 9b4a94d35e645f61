//! Archgraph Engine — run orchestration and the collaborator boundaries
//! (version control, persistence)

pub mod persist;
pub mod run;
pub mod vcs;


pub use persist::{FsStore, MemoryStore, PersistError, SnapshotRecord, SnapshotStore, CACHE_DIR};
pub use run::{
    manifest_diff, AnalysisEngine, AnalysisOptions, AnalysisOutcome, AnalysisRequest, EngineError,
};
pub use vcs::{LocalRepository, PathFilters, VcsError, VersionControl};
