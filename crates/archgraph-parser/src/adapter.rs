//! The `parse(path, content, tag) -> SourceUnit | ParseFailure` contract
//!
//! One walker drives every registered language through its
//! [`LanguageSpec`] tables. Adapters do best-effort name extraction;
//! references keep free-text targets and are reconciled at graph build.

use std::path::Path;
use std::sync::OnceLock;

use archgraph_core::{
    ContentHash, ParseFailure, Reference, RelationKind, SourceUnit, SymbolDecl, SymbolKind,
};
use regex::Regex;
use tree_sitter::{Node, Tree};

use crate::languages::{by_tag, LanguageSpec};
use crate::pool::ParserPool;

/// Looks up the adapter for a language tag and runs the shared walker.
pub struct AdapterRegistry {
    pool: ParserPool,
}

impl AdapterRegistry {
    pub fn new(pool: ParserPool) -> Self {
        AdapterRegistry { pool }
    }

    /// Parse one file synchronously. Failures are per-file and never
    /// fatal to a run: the caller records a diagnostic and continues.
    pub fn parse_blocking(
        &self,
        path: &Path,
        content: &[u8],
        tag: &str,
    ) -> Result<SourceUnit, ParseFailure> {
        let spec = by_tag(tag).ok_or_else(|| ParseFailure::UnsupportedLanguage {
            tag: tag.to_string(),
        })?;
        let text = std::str::from_utf8(content).map_err(|_| ParseFailure::InvalidEncoding)?;
        let tree = self
            .pool
            .parse_blocking(spec, text.to_string())
            .map_err(|e| ParseFailure::Malformed {
                reason: e.to_string(),
            })?;
        extract(path, content, text, spec, &tree)
    }

    /// Parse one file from async context.
    pub async fn parse(
        &self,
        path: &Path,
        content: &[u8],
        tag: &str,
    ) -> Result<SourceUnit, ParseFailure> {
        let spec = by_tag(tag).ok_or_else(|| ParseFailure::UnsupportedLanguage {
            tag: tag.to_string(),
        })?;
        let text = std::str::from_utf8(content).map_err(|_| ParseFailure::InvalidEncoding)?;
        let tree = self
            .pool
            .parse(spec, text.to_string())
            .await
            .map_err(|e| ParseFailure::Malformed {
                reason: e.to_string(),
            })?;
        extract(path, content, text, spec, &tree)
    }
}

fn extract(
    path: &Path,
    content: &[u8],
    text: &str,
    spec: &'static LanguageSpec,
    tree: &Tree,
) -> Result<SourceUnit, ParseFailure> {
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return Err(ParseFailure::Malformed {
            reason: format!("syntax error near line {line}"),
        });
    }

    let module = module_scope(path);
    let mut walker = Walker {
        spec,
        source: text.as_bytes(),
        module: &module,
        symbols: Vec::new(),
        references: Vec::new(),
        scope: Vec::new(),
    };
    walker.visit(root);

    Ok(SourceUnit {
        path: path.to_path_buf(),
        hash: ContentHash::of(content),
        language: spec.tag.to_string(),
        symbols: walker.symbols,
        references: walker.references,
    })
}

/// File-scoped module prefix: the file stem.
fn module_scope(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string()
}

struct Walker<'a> {
    spec: &'static LanguageSpec,
    source: &'a [u8],
    module: &'a str,
    symbols: Vec<SymbolDecl>,
    references: Vec<Reference>,
    /// Enclosing symbol qualified names, innermost last.
    scope: Vec<String>,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, node: Node<'a>) {
        let kind = node.kind();

        let declared = self
            .spec
            .symbols
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, symbol_kind)| self.declare(node, *symbol_kind));

        self.collect_references(node);

        // Method containers scope their children even when the
        // container itself declares no symbol (rust impl blocks).
        let container = if self.spec.method_containers.contains(&kind) && declared.is_none() {
            node_name(node, self.source).map(|name| self.qualify(&name))
        } else {
            None
        };

        let pushed = match (&declared, &container) {
            (Some(qualified), _) | (_, Some(qualified)) => {
                self.scope.push(qualified.clone());
                true
            }
            _ => false,
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }

        if pushed {
            self.scope.pop();
        }
    }

    /// Record a symbol declaration; returns its qualified name.
    fn declare(&mut self, node: Node<'a>, mut kind: SymbolKind) -> Option<String> {
        let name = node_name(node, self.source)?;
        if kind == SymbolKind::Function && self.enclosed_by_container(node) {
            kind = SymbolKind::Method;
        }
        let qualified = self.qualify(&name);
        let alias = if self.scope.is_empty() {
            Some(name.clone())
        } else {
            None
        };
        self.symbols.push(SymbolDecl {
            name,
            qualified_name: qualified.clone(),
            kind,
            line_start: line_of(node.start_position()),
            line_end: line_of(node.end_position()),
            alias,
        });
        Some(qualified)
    }

    fn enclosed_by_container(&self, node: Node<'a>) -> bool {
        let mut cursor = node.parent();
        while let Some(parent) = cursor {
            if self.spec.method_containers.contains(&parent.kind()) {
                return true;
            }
            cursor = parent.parent();
        }
        false
    }

    fn qualify(&self, name: &str) -> String {
        match self.scope.last() {
            Some(outer) => format!("{outer}::{name}"),
            None => format!("{}::{name}", self.module),
        }
    }

    fn origin(&self) -> String {
        self.scope
            .last()
            .cloned()
            .unwrap_or_else(|| self.module.to_string())
    }

    fn collect_references(&mut self, node: Node<'a>) {
        let kind = node.kind();
        let line = line_of(node.start_position());

        for (call_kind, field) in self.spec.calls {
            if kind == *call_kind {
                if let Some(target) = field_text(node, field, self.source) {
                    self.push_reference(target, RelationKind::Calls, line);
                }
            }
        }
        for (import_kind, field) in self.spec.imports {
            if kind == *import_kind {
                let target = if field.is_empty() {
                    first_named_text(node, self.source)
                } else {
                    field_text(node, field, self.source)
                };
                if let Some(target) = target {
                    self.push_reference(strip_quotes(&target), RelationKind::Imports, line);
                }
            }
        }
        for (extends_kind, field) in self.spec.extends {
            if kind == *extends_kind {
                let holder = if field.is_empty() {
                    Some(node)
                } else {
                    node.child_by_field_name(field)
                };
                if let Some(holder) = holder {
                    for target in type_targets(holder, self.source) {
                        self.push_reference(target, RelationKind::Extends, line);
                    }
                }
            }
        }
        for (compose_kind, field) in self.spec.composes {
            if kind == *compose_kind {
                if let Some(target) = field_text(node, field, self.source) {
                    self.push_reference(target, RelationKind::Composes, line);
                }
            }
        }
    }

    fn push_reference(&mut self, target: String, kind: RelationKind, line: u32) {
        let target = target.trim().to_string();
        if target.is_empty() {
            return;
        }
        self.references.push(Reference {
            from: self.origin(),
            target,
            kind,
            line,
        });
    }
}

fn line_of(point: tree_sitter::Point) -> u32 {
    point.row as u32 + 1
}

fn field_text(node: Node<'_>, field: &str, source: &[u8]) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    child.utf8_text(source).ok().map(|t| t.to_string())
}

fn first_named_text(node: Node<'_>, source: &[u8]) -> Option<String> {
    let child = node.named_child(0)?;
    child.utf8_text(source).ok().map(|t| t.to_string())
}

fn strip_quotes(text: &str) -> String {
    text.trim_matches(['"', '\'', '<', '>']).to_string()
}

/// Identifier-path shape: `Foo`, `pkg.Foo`, `crate::x::Foo`.
fn identifier_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:(?:\.|::)[A-Za-z_][A-Za-z0-9_]*)*$").unwrap())
}

/// Collect supertype names from a heritage/superclass clause: each
/// named child whose text reads as an identifier path.
fn type_targets(node: Node<'_>, source: &[u8]) -> Vec<String> {
    let mut targets = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Ok(text) = child.utf8_text(source) {
            let text = text.trim();
            if identifier_path().is_match(text) {
                targets.push(text.to_string());
            }
        }
    }
    if targets.is_empty() {
        if let Ok(text) = node.utf8_text(source) {
            let text = text.trim();
            if identifier_path().is_match(text) {
                targets.push(text.to_string());
            }
        }
    }
    targets
}

/// Best-effort declaration name: the `name` field, else the innermost
/// `declarator` (C-style), else the first identifier descendant.
fn node_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return name.utf8_text(source).ok().map(|t| t.to_string());
    }
    let mut cursor = node;
    let mut descended = false;
    while let Some(inner) = cursor.child_by_field_name("declarator") {
        cursor = inner;
        descended = true;
    }
    if descended {
        if cursor.kind().ends_with("identifier") {
            return cursor.utf8_text(source).ok().map(|t| t.to_string());
        }
        if let Some(ident) = first_identifier(cursor) {
            return ident.utf8_text(source).ok().map(|t| t.to_string());
        }
    }
    // Rust impl blocks: the implemented type names the container.
    if let Some(ty) = node.child_by_field_name("type") {
        return ty.utf8_text(source).ok().map(|t| t.to_string());
    }
    None
}

fn first_identifier(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind().ends_with("identifier") {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_identifier(child) {
            return Some(found);
        }
    }
    None
}

fn first_error_line(node: Node<'_>) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(node.start_position()));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}
