//! Registered language adapters: tag → grammar + extraction tables
//!
//! Per-language behavior is data, not subclasses: each entry names the
//! tree-sitter grammar and the AST node kinds that declare symbols or
//! produce references. One shared walker (see `adapter`) consumes the
//! tables.

use archgraph_core::SymbolKind;
use tree_sitter::Language;

/// Extraction tables for one language.
pub struct LanguageSpec {
    pub tag: &'static str,
    pub extensions: &'static [&'static str],
    language: fn() -> Language,
    /// Node kinds that declare a symbol.
    pub symbols: &'static [(&'static str, SymbolKind)],
    /// Container node kinds inside which a function declaration is a
    /// method and gets the container's name in its qualified name.
    pub method_containers: &'static [&'static str],
    /// (node kind, callee field) pairs producing call references.
    pub calls: &'static [(&'static str, &'static str)],
    /// (node kind, path field) pairs producing import references. An
    /// empty field name means "first named child".
    pub imports: &'static [(&'static str, &'static str)],
    /// (node kind, field) pairs producing extends references. An empty
    /// field name collects every identifier child.
    pub extends: &'static [(&'static str, &'static str)],
    /// (node kind, field) pairs producing composes references.
    pub composes: &'static [(&'static str, &'static str)],
}

impl LanguageSpec {
    pub fn grammar(&self) -> Language {
        (self.language)()
    }
}

static RUST: LanguageSpec = LanguageSpec {
    tag: "rust",
    extensions: &["rs"],
    language: || tree_sitter_rust::LANGUAGE.into(),
    symbols: &[
        ("function_item", SymbolKind::Function),
        ("struct_item", SymbolKind::Struct),
        ("enum_item", SymbolKind::Enum),
        ("trait_item", SymbolKind::Interface),
        ("mod_item", SymbolKind::Module),
        ("type_item", SymbolKind::TypeAlias),
        ("const_item", SymbolKind::Constant),
        ("static_item", SymbolKind::Constant),
    ],
    method_containers: &["impl_item"],
    calls: &[("call_expression", "function")],
    imports: &[("use_declaration", "argument")],
    extends: &[("impl_item", "trait")],
    composes: &[("field_declaration", "type")],
};

static TYPESCRIPT: LanguageSpec = LanguageSpec {
    tag: "typescript",
    extensions: &["ts", "tsx"],
    language: || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    symbols: &[
        ("class_declaration", SymbolKind::Class),
        ("abstract_class_declaration", SymbolKind::Class),
        ("function_declaration", SymbolKind::Function),
        ("method_definition", SymbolKind::Method),
        ("interface_declaration", SymbolKind::Interface),
        ("type_alias_declaration", SymbolKind::TypeAlias),
        ("enum_declaration", SymbolKind::Enum),
    ],
    method_containers: &["class_declaration", "abstract_class_declaration"],
    calls: &[("call_expression", "function")],
    imports: &[("import_statement", "source")],
    extends: &[("extends_clause", ""), ("implements_clause", "")],
    composes: &[("new_expression", "constructor")],
};

static JAVASCRIPT: LanguageSpec = LanguageSpec {
    tag: "javascript",
    extensions: &["js", "jsx", "mjs", "cjs"],
    language: || tree_sitter_javascript::LANGUAGE.into(),
    symbols: &[
        ("class_declaration", SymbolKind::Class),
        ("function_declaration", SymbolKind::Function),
        ("method_definition", SymbolKind::Method),
    ],
    method_containers: &["class_declaration"],
    calls: &[("call_expression", "function")],
    imports: &[("import_statement", "source")],
    extends: &[("class_heritage", "")],
    composes: &[("new_expression", "constructor")],
};

static PYTHON: LanguageSpec = LanguageSpec {
    tag: "python",
    extensions: &["py", "pyi"],
    language: || tree_sitter_python::LANGUAGE.into(),
    symbols: &[
        ("function_definition", SymbolKind::Function),
        ("class_definition", SymbolKind::Class),
    ],
    method_containers: &["class_definition"],
    calls: &[("call", "function")],
    imports: &[("import_statement", ""), ("import_from_statement", "module_name")],
    extends: &[("class_definition", "superclasses")],
    composes: &[],
};

static GO: LanguageSpec = LanguageSpec {
    tag: "go",
    extensions: &["go"],
    language: || tree_sitter_go::LANGUAGE.into(),
    symbols: &[
        ("function_declaration", SymbolKind::Function),
        ("method_declaration", SymbolKind::Method),
        ("type_spec", SymbolKind::Struct),
    ],
    method_containers: &[],
    calls: &[("call_expression", "function")],
    imports: &[("import_spec", "path")],
    extends: &[],
    composes: &[],
};

static JAVA: LanguageSpec = LanguageSpec {
    tag: "java",
    extensions: &["java"],
    language: || tree_sitter_java::LANGUAGE.into(),
    symbols: &[
        ("class_declaration", SymbolKind::Class),
        ("interface_declaration", SymbolKind::Interface),
        ("enum_declaration", SymbolKind::Enum),
        ("method_declaration", SymbolKind::Method),
        ("constructor_declaration", SymbolKind::Method),
    ],
    method_containers: &["class_declaration", "interface_declaration", "enum_declaration"],
    calls: &[("method_invocation", "name")],
    imports: &[("import_declaration", "")],
    extends: &[("superclass", ""), ("super_interfaces", "")],
    composes: &[("object_creation_expression", "type")],
};

static C: LanguageSpec = LanguageSpec {
    tag: "c",
    extensions: &["c", "h"],
    language: || tree_sitter_c::LANGUAGE.into(),
    symbols: &[
        ("function_definition", SymbolKind::Function),
        ("struct_specifier", SymbolKind::Struct),
        ("enum_specifier", SymbolKind::Enum),
        ("type_definition", SymbolKind::TypeAlias),
    ],
    method_containers: &[],
    calls: &[("call_expression", "function")],
    imports: &[("preproc_include", "path")],
    extends: &[],
    composes: &[],
};

static CPP: LanguageSpec = LanguageSpec {
    tag: "cpp",
    extensions: &["cpp", "cc", "cxx", "hpp", "hh"],
    language: || tree_sitter_cpp::LANGUAGE.into(),
    symbols: &[
        ("function_definition", SymbolKind::Function),
        ("class_specifier", SymbolKind::Class),
        ("struct_specifier", SymbolKind::Struct),
        ("enum_specifier", SymbolKind::Enum),
        ("type_definition", SymbolKind::TypeAlias),
    ],
    method_containers: &["class_specifier", "struct_specifier"],
    calls: &[("call_expression", "function")],
    imports: &[("preproc_include", "path")],
    extends: &[("base_class_clause", "")],
    composes: &[("new_expression", "type")],
};

/// Every registered language, in lookup order.
pub fn registry() -> &'static [&'static LanguageSpec] {
    static REGISTRY: &[&LanguageSpec] = &[
        &RUST,
        &TYPESCRIPT,
        &JAVASCRIPT,
        &PYTHON,
        &GO,
        &JAVA,
        &C,
        &CPP,
    ];
    REGISTRY
}

pub fn by_tag(tag: &str) -> Option<&'static LanguageSpec> {
    registry().iter().copied().find(|spec| spec.tag == tag)
}

/// Language tag for a file path, from its extension. None means the
/// file is skipped with an UnsupportedLanguage diagnostic.
pub fn tag_for_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    registry()
        .iter()
        .find(|spec| spec.extensions.contains(&ext))
        .map(|spec| spec.tag)
}
