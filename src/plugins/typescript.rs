use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::warn;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use crate::connection::{FileAnalysis, RawReference, ReferenceKind};
use crate::index::{FileIndex, normalize};
use crate::plugins::{LanguagePlugin, PluginError};

/// Extension probe order for specifiers without an extension, and for
/// directory `index.*` probing. The first existing candidate wins — this
/// ordering is what makes `./utils` prefer `utils.ts` over `utils.js`.
const EXTENSION_ORDER: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "json"];

/// Node.js built-in module names. Always unresolved, with or without the
/// `node:` prefix.
const BUILTIN_MODULES: &[&str] = &[
    "assert", "buffer", "child_process", "cluster", "console", "constants", "crypto", "dgram",
    "dns", "domain", "events", "fs", "http", "http2", "https", "module", "net", "os", "path",
    "perf_hooks", "process", "punycode", "querystring", "readline", "repl", "stream",
    "string_decoder", "timers", "tls", "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

// ---------------------------------------------------------------------------
// Grammar selection
// ---------------------------------------------------------------------------

// Thread-local Parser instances — one per rayon worker thread, zero lock
// contention. Each Parser is initialised once per thread with its grammar.
//
// `.ts` and `.tsx` MUST use different grammars: the TypeScript grammar cannot
// parse JSX, and the TSX grammar breaks angle-bracket type assertions.
thread_local! {
    static PARSER_TS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()).unwrap();
        p
    });
    static PARSER_TSX: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into()).unwrap();
        p
    });
    static PARSER_JS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_javascript::LANGUAGE.into()).unwrap();
        p
    });
}

fn parse_with_grammar(ext: &str, source: &[u8]) -> Option<Tree> {
    let cell = match ext {
        "ts" => &PARSER_TS,
        "tsx" => &PARSER_TSX,
        "js" | "jsx" | "mjs" | "cjs" => &PARSER_JS,
        _ => return None,
    };
    cell.with(|p| p.borrow_mut().parse(source, None))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Matches `import ... from 'module'` (static and type-only — the kind is
/// decided by inspecting the statement's children afterwards).
const IMPORT_QUERY: &str = r#"
    (import_statement
      source: (string (string_fragment) @module_path)) @import
"#;

/// Matches `export ... from 'module'` (named re-export and `export *`).
const REEXPORT_QUERY: &str = r#"
    (export_statement
      source: (string (string_fragment) @module_path)) @reexport
"#;

/// Matches all `identifier(...)` calls with a string argument; filtered for
/// `require` in code — tree-sitter StreamingIterator does not auto-apply
/// custom predicates.
const REQUIRE_QUERY: &str = r#"
    (call_expression
      function: (identifier) @fn
      arguments: (arguments (string (string_fragment) @module_path)))
"#;

/// Matches dynamic `import('module')` calls.
const DYNAMIC_IMPORT_QUERY: &str = r#"
    (call_expression
      function: (import)
      arguments: (arguments (string (string_fragment) @module_path))) @dynamic_import
"#;

/// The four compiled queries for one grammar.
struct GrammarQueries {
    import: Query,
    reexport: Query,
    require: Query,
    dynamic_import: Query,
}

impl GrammarQueries {
    fn build(language: &Language) -> Self {
        Self {
            import: Query::new(language, IMPORT_QUERY).expect("invalid import query"),
            reexport: Query::new(language, REEXPORT_QUERY).expect("invalid reexport query"),
            require: Query::new(language, REQUIRE_QUERY).expect("invalid require query"),
            dynamic_import: Query::new(language, DYNAMIC_IMPORT_QUERY)
                .expect("invalid dynamic import query"),
        }
    }
}

// One query set per grammar — the TS/TSX/JS grammars have distinct node tables,
// so a Query compiled for one cannot be reused for another.
static QUERIES_TS: OnceLock<GrammarQueries> = OnceLock::new();
static QUERIES_TSX: OnceLock<GrammarQueries> = OnceLock::new();
static QUERIES_JS: OnceLock<GrammarQueries> = OnceLock::new();

fn queries_for(ext: &str) -> &'static GrammarQueries {
    match ext {
        "ts" => QUERIES_TS.get_or_init(|| {
            GrammarQueries::build(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        }),
        "tsx" => QUERIES_TSX
            .get_or_init(|| GrammarQueries::build(&tree_sitter_typescript::LANGUAGE_TSX.into())),
        _ => QUERIES_JS
            .get_or_init(|| GrammarQueries::build(&tree_sitter_javascript::LANGUAGE.into())),
    }
}

fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn reference_at(node: Node, specifier: &str, kind: ReferenceKind) -> RawReference {
    let pos = node.start_position();
    RawReference::new(specifier, kind, pos.row as u32 + 1).with_column(pos.column as u32)
}

/// True for `import type { X } from './x'` — the statement carries a `type`
/// keyword token as a direct child.
fn is_type_only_import(import_node: Node) -> bool {
    let mut cursor = import_node.walk();
    for child in import_node.children(&mut cursor) {
        if child.kind() == "type" {
            return true;
        }
        if child.kind() == "import_clause" {
            // `import { type X } from ...` with ALL specifiers type-only is
            // still treated as a value import here; only statement-level
            // `import type` gets the TypeOnly kind.
            break;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

fn detect_references(tree: &Tree, source: &[u8], queries: &GrammarQueries) -> Vec<RawReference> {
    let mut refs = Vec::new();
    let root = tree.root_node();

    // --- ESM static / type-only imports ---
    {
        let query = &queries.import;
        let path_idx = query
            .capture_index_for_name("module_path")
            .expect("import query must have @module_path");
        let stmt_idx = query
            .capture_index_for_name("import")
            .expect("import query must have @import");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        while let Some(m) = matches.next() {
            let mut stmt: Option<Node> = None;
            let mut module_path: Option<&str> = None;
            for capture in m.captures {
                if capture.index == stmt_idx {
                    stmt = Some(capture.node);
                } else if capture.index == path_idx {
                    module_path = Some(node_text(capture.node, source));
                }
            }
            if let (Some(stmt), Some(path)) = (stmt, module_path) {
                let kind = if is_type_only_import(stmt) {
                    ReferenceKind::TypeOnly
                } else {
                    ReferenceKind::Static
                };
                refs.push(reference_at(stmt, path, kind));
            }
        }
    }

    // --- Re-exports: `export { X } from`, `export * from` ---
    {
        let query = &queries.reexport;
        let path_idx = query
            .capture_index_for_name("module_path")
            .expect("reexport query must have @module_path");
        let stmt_idx = query
            .capture_index_for_name("reexport")
            .expect("reexport query must have @reexport");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        while let Some(m) = matches.next() {
            let mut stmt: Option<Node> = None;
            let mut module_path: Option<&str> = None;
            for capture in m.captures {
                if capture.index == stmt_idx {
                    stmt = Some(capture.node);
                } else if capture.index == path_idx {
                    module_path = Some(node_text(capture.node, source));
                }
            }
            if let (Some(stmt), Some(path)) = (stmt, module_path) {
                refs.push(reference_at(stmt, path, ReferenceKind::ReExport));
            }
        }
    }

    // --- CJS require() ---
    {
        let query = &queries.require;
        let fn_idx = query
            .capture_index_for_name("fn")
            .expect("require query must have @fn");
        let path_idx = query
            .capture_index_for_name("module_path")
            .expect("require query must have @module_path");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        while let Some(m) = matches.next() {
            let mut callee: Option<Node> = None;
            let mut path_node: Option<Node> = None;
            for capture in m.captures {
                if capture.index == fn_idx {
                    callee = Some(capture.node);
                } else if capture.index == path_idx {
                    path_node = Some(capture.node);
                }
            }
            if let (Some(callee), Some(path_node)) = (callee, path_node) {
                if node_text(callee, source) == "require" {
                    refs.push(reference_at(
                        callee,
                        node_text(path_node, source),
                        ReferenceKind::Require,
                    ));
                }
            }
        }
    }

    // --- dynamic import() ---
    {
        let query = &queries.dynamic_import;
        let path_idx = query
            .capture_index_for_name("module_path")
            .expect("dynamic import query must have @module_path");
        let stmt_idx = query
            .capture_index_for_name("dynamic_import")
            .expect("dynamic import query must have @dynamic_import");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        while let Some(m) = matches.next() {
            let mut stmt: Option<Node> = None;
            let mut module_path: Option<&str> = None;
            for capture in m.captures {
                if capture.index == stmt_idx {
                    stmt = Some(capture.node);
                } else if capture.index == path_idx {
                    module_path = Some(node_text(capture.node, source));
                }
            }
            if let (Some(stmt), Some(path)) = (stmt, module_path) {
                refs.push(reference_at(stmt, path, ReferenceKind::Dynamic));
            }
        }
    }

    // Queries run in statement order within each pass; sort so the final list
    // follows source order regardless of kind.
    refs.sort_by_key(|r| (r.line, r.column));
    refs
}

// ---------------------------------------------------------------------------
// tsconfig loading (baseUrl + paths aliases)
// ---------------------------------------------------------------------------

/// One `paths` alias entry, in declaration order.
#[derive(Debug, Clone)]
struct PathAlias {
    /// Pattern as written, with at most one `*` wildcard (e.g. `@app/*`).
    pattern: String,
    /// Substitution targets, relative to `baseUrl`.
    targets: Vec<String>,
}

/// Static resolver configuration loaded from tsconfig.json at initialize.
#[derive(Debug, Clone, Default)]
struct TsResolverConfig {
    /// `compilerOptions.baseUrl`, workspace-relative. Alias targets resolve
    /// against it; defaults to the workspace root.
    base_url: PathBuf,
    /// `compilerOptions.paths` entries, declaration order preserved.
    aliases: Vec<PathAlias>,
}

/// Strip JSONC constructs (line/block comments, trailing commas) so tsconfig
/// files parse with a strict JSON parser. Comment markers inside string
/// literals are preserved.
fn strip_jsonc(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut in_string = false;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1] as char);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
        } else if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
        } else if c == '/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == '/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
        } else if c == ',' {
            // Trailing comma: look ahead to the next non-whitespace character.
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                j += 1;
            }
            if j < bytes.len() && (bytes[j] == b'}' || bytes[j] == b']') {
                i += 1; // drop the comma
            } else {
                out.push(c);
                i += 1;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

fn load_tsconfig(workspace_root: &Path) -> TsResolverConfig {
    let mut config = TsResolverConfig::default();
    let tsconfig_path = workspace_root.join("tsconfig.json");
    let contents = match std::fs::read_to_string(&tsconfig_path) {
        Ok(c) => c,
        Err(_) => return config,
    };
    let value: serde_json::Value = match serde_json::from_str(&strip_jsonc(&contents)) {
        Ok(v) => v,
        Err(err) => {
            warn!(path = %tsconfig_path.display(), %err, "failed to parse tsconfig.json; aliases disabled");
            return config;
        }
    };
    let Some(options) = value.get("compilerOptions") else {
        return config;
    };
    if let Some(base) = options.get("baseUrl").and_then(|v| v.as_str()) {
        config.base_url = normalize(Path::new(base));
    }
    if let Some(paths) = options.get("paths").and_then(|v| v.as_object()) {
        for (pattern, targets) in paths {
            let targets: Vec<String> = targets
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|t| t.as_str().map(str::to_owned))
                        .collect()
                })
                .unwrap_or_default();
            config.aliases.push(PathAlias { pattern: pattern.clone(), targets });
        }
    }
    config
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// TypeScript/JavaScript plugin: tree-sitter based detection (a real parser,
/// so imports inside strings and comments are never misidentified) plus
/// Node-style path resolution with tsconfig alias support.
pub struct TypeScriptPlugin {
    config: TsResolverConfig,
}

impl TypeScriptPlugin {
    pub fn new() -> Self {
        Self { config: TsResolverConfig::default() }
    }

    /// Probe one extensionless candidate: exact path first, then the fixed
    /// extension order, then `candidate/index.*` in the same order.
    fn probe(&self, candidate: &Path, index: &FileIndex) -> Option<PathBuf> {
        if candidate.extension().is_some() {
            if let Some(abs) = index.absolute(candidate) {
                return Some(abs.clone());
            }
        }
        let as_str = candidate.to_string_lossy();
        for ext in EXTENSION_ORDER {
            let with_ext = PathBuf::from(format!("{as_str}.{ext}"));
            if let Some(abs) = index.absolute(&with_ext) {
                return Some(abs.clone());
            }
        }
        for ext in EXTENSION_ORDER {
            let index_file = candidate.join(format!("index.{ext}"));
            if let Some(abs) = index.absolute(&index_file) {
                return Some(abs.clone());
            }
        }
        None
    }

    /// Match `specifier` against the configured alias patterns.
    ///
    /// Most-specific (longest literal prefix) pattern first; within equal
    /// specificity, tsconfig declaration order. The first alias target that
    /// probes to an existing file wins.
    fn resolve_alias(&self, specifier: &str, index: &FileIndex) -> Option<PathBuf> {
        let mut candidates: Vec<(usize, &PathAlias, String)> = Vec::new();
        for alias in &self.config.aliases {
            if let Some(star) = alias.pattern.find('*') {
                let (prefix, suffix) = (&alias.pattern[..star], &alias.pattern[star + 1..]);
                if specifier.starts_with(prefix)
                    && specifier.ends_with(suffix)
                    && specifier.len() >= prefix.len() + suffix.len()
                {
                    let captured = &specifier[prefix.len()..specifier.len() - suffix.len()];
                    candidates.push((prefix.len(), alias, captured.to_owned()));
                }
            } else if alias.pattern == specifier {
                // Exact (wildcard-free) aliases outrank any wildcard match.
                candidates.push((usize::MAX, alias, String::new()));
            }
        }
        // Stable sort keeps declaration order within equal specificity.
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, alias, captured) in candidates {
            for target in &alias.targets {
                let substituted = target.replacen('*', &captured, 1);
                let candidate = self.config.base_url.join(substituted);
                if let Some(path) = self.probe(&candidate, index) {
                    return Some(path);
                }
            }
        }
        None
    }
}

impl Default for TypeScriptPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for TypeScriptPlugin {
    fn id(&self) -> &'static str {
        "typescript"
    }

    fn name(&self) -> &'static str {
        "TypeScript / JavaScript"
    }

    fn version(&self) -> &'static str {
        "0.3.0"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs"]
    }

    fn file_colors(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("ts", "#3178c6"),
            ("tsx", "#3178c6"),
            ("js", "#f1e05a"),
            ("jsx", "#f1e05a"),
            ("mjs", "#f1e05a"),
            ("cjs", "#f1e05a"),
        ]
    }

    fn default_exclude(&self) -> &'static [&'static str] {
        &["**/node_modules/**", "**/dist/**", "**/build/**", "**/.next/**"]
    }

    fn initialize(&mut self, workspace_root: &Path) -> Result<(), PluginError> {
        self.config = load_tsconfig(workspace_root);
        Ok(())
    }

    fn dispose(&mut self) {
        self.config = TsResolverConfig::default();
    }

    fn detect(&self, path: &Path, content: &str) -> FileAnalysis {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("ts");
        let source = content.as_bytes();
        let Some(tree) = parse_with_grammar(ext, source) else {
            warn!(path = %path.display(), "tree-sitter returned no tree; treating file as empty");
            return FileAnalysis::default();
        };
        FileAnalysis {
            references: detect_references(&tree, source, queries_for(ext)),
            declarations: Vec::new(),
        }
    }

    fn resolve(
        &self,
        reference: &RawReference,
        from: &Path,
        index: &FileIndex,
    ) -> Option<PathBuf> {
        let specifier = reference.specifier.as_str();

        // Built-in runtime modules never resolve.
        let bare_name = specifier.strip_prefix("node:").unwrap_or(specifier);
        if specifier.starts_with("node:") || BUILTIN_MODULES.contains(&bare_name) {
            return None;
        }

        if specifier.starts_with("./") || specifier.starts_with("../") {
            let from_dir = from.parent().unwrap_or(Path::new(""));
            return self.probe(&normalize(&from_dir.join(specifier)), index);
        }

        if !self.config.aliases.is_empty() {
            if let Some(path) = self.resolve_alias(specifier, index) {
                return Some(path);
            }
        }

        // Bare specifier: external package.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn detect(content: &str) -> Vec<RawReference> {
        TypeScriptPlugin::new()
            .detect(Path::new("a.ts"), content)
            .references
    }

    fn specs(refs: &[RawReference]) -> Vec<(&str, ReferenceKind)> {
        refs.iter().map(|r| (r.specifier.as_str(), r.kind)).collect()
    }

    #[test]
    fn test_detect_static_and_type_only_imports() {
        let refs = detect(
            "import { a } from './a';\n\
             import type { T } from './types';\n\
             import * as ns from '../ns';\n",
        );
        assert_eq!(
            specs(&refs),
            vec![
                ("./a", ReferenceKind::Static),
                ("./types", ReferenceKind::TypeOnly),
                ("../ns", ReferenceKind::Static),
            ]
        );
        assert_eq!(refs[1].line, 2);
    }

    #[test]
    fn test_detect_reexport_require_dynamic() {
        let refs = detect(
            "export { x } from './x';\n\
             export * from './star';\n\
             const legacy = require('./legacy');\n\
             const lazy = import('./lazy');\n",
        );
        assert_eq!(
            specs(&refs),
            vec![
                ("./x", ReferenceKind::ReExport),
                ("./star", ReferenceKind::ReExport),
                ("./legacy", ReferenceKind::Require),
                ("./lazy", ReferenceKind::Dynamic),
            ]
        );
    }

    #[test]
    fn test_strings_and_comments_are_immune() {
        let refs = detect(
            "// import fake from './fake';\n\
             /* const x = require('./block'); */\n\
             const s = \"import bogus from './bogus'\";\n\
             const t = `export * from './tpl'`;\n",
        );
        assert!(refs.is_empty(), "no reference may come from a comment or string: {refs:?}");
    }

    #[test]
    fn test_empty_and_comment_only_files() {
        assert!(detect("").is_empty());
        assert!(detect("// only a comment\n").is_empty());
    }

    #[test]
    fn test_tsx_grammar_parses_jsx() {
        let plugin = TypeScriptPlugin::new();
        let refs = plugin
            .detect(
                Path::new("view.tsx"),
                "import { App } from './app';\nexport const V = () => <App title=\"x\" />;\n",
            )
            .references;
        assert_eq!(specs(&refs), vec![("./app", ReferenceKind::Static)]);
    }

    fn index() -> FileIndex {
        FileIndex::from_pairs([
            ("src/utils.ts", "/ws/src/utils.ts"),
            ("src/utils.js", "/ws/src/utils.js"),
            ("src/widgets/index.tsx", "/ws/src/widgets/index.tsx"),
            ("src/data.json", "/ws/src/data.json"),
            ("lib/core/api.ts", "/ws/lib/core/api.ts"),
        ])
    }

    fn static_ref(spec: &str) -> RawReference {
        RawReference::new(spec, ReferenceKind::Static, 1)
    }

    #[test]
    fn test_extension_precedence_prefers_ts_over_js() {
        let plugin = TypeScriptPlugin::new();
        let resolved = plugin.resolve(&static_ref("./utils"), Path::new("src/main.ts"), &index());
        assert_eq!(resolved, Some(PathBuf::from("/ws/src/utils.ts")));
    }

    #[test]
    fn test_directory_resolves_to_index_file() {
        let plugin = TypeScriptPlugin::new();
        let resolved = plugin.resolve(&static_ref("./widgets"), Path::new("src/main.ts"), &index());
        assert_eq!(resolved, Some(PathBuf::from("/ws/src/widgets/index.tsx")));
    }

    #[test]
    fn test_exact_path_with_extension() {
        let plugin = TypeScriptPlugin::new();
        let resolved =
            plugin.resolve(&static_ref("./data.json"), Path::new("src/main.ts"), &index());
        assert_eq!(resolved, Some(PathBuf::from("/ws/src/data.json")));
    }

    #[test]
    fn test_relative_walks_up_directories() {
        let plugin = TypeScriptPlugin::new();
        let resolved = plugin.resolve(
            &static_ref("../../lib/core/api"),
            Path::new("src/nested/deep.ts"),
            &index(),
        );
        assert_eq!(resolved, Some(PathBuf::from("/ws/lib/core/api.ts")));
    }

    #[test]
    fn test_bare_and_builtin_specifiers_never_resolve() {
        let plugin = TypeScriptPlugin::new();
        for spec in ["react", "fs", "node:path", "lodash/merge"] {
            assert_eq!(
                plugin.resolve(&static_ref(spec), Path::new("src/main.ts"), &index()),
                None,
                "`{spec}` must stay external"
            );
        }
    }

    #[test]
    fn test_alias_resolution_most_specific_wins() {
        let mut plugin = TypeScriptPlugin::new();
        plugin.config = TsResolverConfig {
            base_url: PathBuf::new(),
            aliases: vec![
                PathAlias { pattern: "@app/*".into(), targets: vec!["src/*".into()] },
                PathAlias { pattern: "@app/core/*".into(), targets: vec!["lib/core/*".into()] },
            ],
        };
        // Longer literal prefix (`@app/core/`) must win over `@app/`.
        let resolved = plugin.resolve(&static_ref("@app/core/api"), Path::new("main.ts"), &index());
        assert_eq!(resolved, Some(PathBuf::from("/ws/lib/core/api.ts")));
        // The general alias still serves everything else.
        let resolved = plugin.resolve(&static_ref("@app/utils"), Path::new("main.ts"), &index());
        assert_eq!(resolved, Some(PathBuf::from("/ws/src/utils.ts")));
    }

    #[test]
    fn test_alias_first_existing_target_wins() {
        let mut plugin = TypeScriptPlugin::new();
        plugin.config = TsResolverConfig {
            base_url: PathBuf::new(),
            aliases: vec![PathAlias {
                pattern: "#shared/*".into(),
                targets: vec!["missing/*".into(), "src/*".into()],
            }],
        };
        let resolved = plugin.resolve(&static_ref("#shared/utils"), Path::new("main.ts"), &index());
        assert_eq!(resolved, Some(PathBuf::from("/ws/src/utils.ts")));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let plugin = TypeScriptPlugin::new();
        let idx = index();
        let r = static_ref("./utils");
        let first = plugin.resolve(&r, Path::new("src/main.ts"), &idx);
        for _ in 0..3 {
            assert_eq!(plugin.resolve(&r, Path::new("src/main.ts"), &idx), first);
        }
    }

    #[test]
    fn test_strip_jsonc_preserves_strings() {
        let raw = r#"{
            // alias section
            "paths": { "@a/*": ["src/*"], }, /* block */
            "note": "not // a comment"
        }"#;
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc(raw)).unwrap();
        assert_eq!(value["note"], "not // a comment");
        assert!(value["paths"].is_object());
    }
}
