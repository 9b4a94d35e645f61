//! Core data structures for the architecture model

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Digest of a file's byte content. Identical content across files or
/// commits shares one [`SourceUnit`] under this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, PartialOrd, Ord)]
pub struct ContentHash(pub u64);

impl ContentHash {
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        ContentHash(hasher.finish())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Language tag carried by a source file, e.g. "rust" or "python".
/// Only tags with a registered parser adapter are analyzable.
pub type LanguageTag = String;

/// What kind of construct a declared symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum SymbolKind {
    Module,
    Class,
    Struct,
    Enum,
    Interface,
    Function,
    Method,
    TypeAlias,
    Constant,
}

/// Stable identifier for a symbol, derived from fully-qualified name +
/// kind. Unchanged qualified names hash to the same id across snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, PartialOrd, Ord)]
pub struct SymbolId(pub u64);

impl SymbolId {
    pub fn new(qualified_name: &str, kind: SymbolKind) -> Self {
        let mut hasher = DefaultHasher::new();
        qualified_name.hash(&mut hasher);
        kind.hash(&mut hasher);
        SymbolId(hasher.finish())
    }
}

/// A named construct declared in one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDecl {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
    /// Public alias the symbol is importable under (usually the bare
    /// name for top-level declarations). Used for opportunistic
    /// reference resolution during graph build.
    pub alias: Option<String>,
}

impl SymbolDecl {
    pub fn id(&self) -> SymbolId {
        SymbolId::new(&self.qualified_name, self.kind)
    }
}

/// How one component relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum RelationKind {
    Calls,
    Imports,
    Extends,
    Composes,
}

/// An outgoing reference from a declared symbol to a (possibly
/// unresolved) target name. Targets stay free text until graph build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Qualified name of the symbol the reference originates in, or the
    /// file's module scope when it occurs at top level.
    pub from: String,
    /// Best-effort target name as written in source.
    pub target: String,
    pub kind: RelationKind,
    pub line: u32,
}

/// One parsed file. Immutable once created; keyed by content hash so
/// identical content shares a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub hash: ContentHash,
    pub language: LanguageTag,
    pub symbols: Vec<SymbolDecl>,
    pub references: Vec<Reference>,
}

/// Heuristic architectural role of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum ComponentKind {
    Ui,
    Service,
    Data,
    Library,
    Entry,
    Unknown,
}

impl ComponentKind {
    /// Assign a role from the component's grouping name. Matches on
    /// conventional path vocabulary only; anything else is Unknown.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let segment_matches = |needles: &[&str]| {
            needles.iter().any(|n| {
                lower
                    .split(['/', '\\', '.', '_', '-'])
                    .any(|seg| seg == *n)
            })
        };
        if segment_matches(&["ui", "view", "views", "component", "components", "pages", "frontend"]) {
            ComponentKind::Ui
        } else if segment_matches(&["service", "services", "handler", "handlers", "controller", "controllers", "api"]) {
            ComponentKind::Service
        } else if segment_matches(&["repository", "repositories", "dao", "store", "storage", "db", "model", "models", "entity", "entities", "persistence"]) {
            ComponentKind::Data
        } else if segment_matches(&["main", "cli", "app", "bin"]) {
            ComponentKind::Entry
        } else if segment_matches(&["lib", "util", "utils", "common", "shared", "core"]) {
            ComponentKind::Library
        } else {
            ComponentKind::Unknown
        }
    }
}

/// Stable identifier for a component, derived from the grouping key.
/// Stays constant across snapshots while the underlying qualified name
/// is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

impl ComponentId {
    pub fn new(group_key: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        group_key.hash(&mut hasher);
        ComponentId(hasher.finish())
    }
}

/// Per-component metrics computed at graph build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComponentMetrics {
    /// Distinct incoming edges.
    pub fan_in: u32,
    /// Distinct outgoing edges.
    pub fan_out: u32,
    /// Member symbol count.
    pub size: u32,
    /// Whether the component sits on a cross-component dependency cycle.
    pub in_cycle: bool,
}

/// A deduplicated architectural unit grouping one or more symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    /// Grouping key the id was derived from (file stem or package path).
    pub group_key: String,
    pub display_name: String,
    pub kind: ComponentKind,
    pub members: Vec<SymbolId>,
    /// Files whose symbols contributed to this component.
    pub files: Vec<PathBuf>,
    pub metrics: ComponentMetrics,
}

/// Directed, weighted relation between two components. Parallel raw
/// references collapse into one edge with summed weight; self-loops are
/// dropped at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: ComponentId,
    pub target: ComponentId,
    pub kind: RelationKind,
    pub weight: u32,
}

/// How symbols are grouped into components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GroupingPolicy {
    /// One component per source file.
    #[default]
    ByFile,
    /// One component per top-level package directory.
    ByPackage,
}

/// A detected architectural pattern over a set of components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub kind: PatternKind,
    /// Human-readable label, e.g. a layer or group name.
    pub label: String,
    pub components: Vec<ComponentId>,
    /// Rule-defined fit in [0, 1].
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Layered,
    RepositoryAccess,
    Hub,
    CyclicDependency,
    MicroserviceGroup,
}

impl PatternKind {
    /// Whether matches of this kind group diagram nodes into clusters.
    pub fn cluster_eligible(&self) -> bool {
        matches!(self, PatternKind::Layered | PatternKind::MicroserviceGroup)
    }
}

/// What happened to a file between two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed { from: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Ordered list of file changes between two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChangeSet {
    pub changes: Vec<FileChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Graph-distance impact of a change set on a prior graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ImpactResult {
    /// Components directly touched by changed files (score 1.0).
    pub directly_touched: Vec<ComponentId>,
    /// Impact score per affected component, in [0, 1]. Components below
    /// the policy minimum are absent.
    pub scores: BTreeMap<ComponentId, f64>,
    /// True when the touched fraction crossed the policy threshold and
    /// downstream stages should regenerate fully instead of scoping to
    /// the affected subgraph.
    pub full_regeneration_recommended: bool,
}

impl ImpactResult {
    pub fn affected(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.scores.keys().copied()
    }
}

/// One (project, commit) pairing subject to analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snapshot {
    pub project: String,
    pub commit: String,
}

impl Snapshot {
    pub fn new(project: impl Into<String>, commit: impl Into<String>) -> Self {
        Snapshot {
            project: project.into(),
            commit: commit.into(),
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.project, self.commit)
    }
}
