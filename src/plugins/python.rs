use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::DepmapConfig;
use crate::connection::{FileAnalysis, RawReference, ReferenceKind};
use crate::index::{FileIndex, normalize};
use crate::plugins::{LanguagePlugin, PluginError};

/// Conventional source directories probed after the workspace root and the
/// configured source roots.
const CONVENTIONAL_ROOTS: &[&str] = &["src", "lib", "app"];

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `import a.b, c as d` — module list after the keyword.
    RE.get_or_init(|| Regex::new(r"^\s*import\s+(.+)$").expect("invalid import regex"))
}

fn from_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `from .pkg.mod import x, y as z` / `from .. import x` / `from m import *`
    RE.get_or_init(|| {
        Regex::new(r"^\s*from\s+(\.*[\w\.]*)\s+import\s+(.+)$").expect("invalid from regex")
    })
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// One logical source line after preprocessing, tagged with the 1-based line
/// number of its first physical line so diagnostics stay accurate.
#[derive(Debug, PartialEq, Eq)]
struct LogicalLine {
    text: String,
    line: u32,
}

/// Strip a `#` comment from a physical line, honoring single/double quotes
/// (a `#` inside a string literal is kept). Not a full tokenizer — escape
/// sequences beyond `\"`/`\'` are handled naively, which is an accepted
/// approximation for import scanning.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (Some(_), b'\\') if i + 1 < bytes.len() => i += 1,
            (Some(q), c) if c == q => quote = None,
            (None, c @ (b'"' | b'\'')) => quote = Some(c),
            (None, b'#') => return &line[..i],
            _ => {}
        }
        i += 1;
    }
    line
}

/// Count triple-quote delimiters (`"""` or `'''`) in a line. An odd total
/// toggles the in-string state.
fn triple_quote_count(line: &str) -> usize {
    line.matches(r#"""""#).count() + line.matches("'''").count()
}

/// Preprocess raw source into logical lines:
///
/// - `#` comments are stripped (quote-aware),
/// - lines inside triple-quoted strings are skipped (heuristic toggle on the
///   opener/closer lines),
/// - parenthesized multi-line `from X import (...)` statements are joined
///   into one logical line tagged with the original starting line number.
fn preprocess(content: &str) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut in_triple = false;
    let mut pending: Option<LogicalLine> = None;

    for (i, raw) in content.lines().enumerate() {
        let line_no = i as u32 + 1;

        if in_triple {
            if triple_quote_count(raw) % 2 == 1 {
                in_triple = false;
            }
            continue;
        }

        let stripped = strip_comment(raw);
        if triple_quote_count(stripped) % 2 == 1 {
            in_triple = true;
            // The opener line may still carry code before the string; import
            // statements never share a line with a docstring opener, so skip.
            continue;
        }

        if let Some(mut joined) = pending.take() {
            joined.text.push(' ');
            joined.text.push_str(stripped.trim());
            if stripped.contains(')') {
                out.push(joined);
            } else {
                pending = Some(joined);
            }
            continue;
        }

        // `from X import (` with no closing paren starts a joined statement.
        if stripped.contains("import") && stripped.contains('(') && !stripped.contains(')') {
            pending = Some(LogicalLine { text: stripped.trim_end().to_owned(), line: line_no });
            continue;
        }

        out.push(LogicalLine { text: stripped.to_owned(), line: line_no });
    }

    // Unterminated parenthesized import at EOF: emit what we have.
    if let Some(joined) = pending {
        out.push(joined);
    }

    out
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Python plugin: line-oriented regex detection over preprocessed logical
/// lines, and dotted-module-path resolution against the workspace root,
/// configured source roots, and conventional directories.
pub struct PythonPlugin {
    /// Workspace-relative source roots, loaded from depmap.toml at initialize.
    source_roots: Vec<PathBuf>,
}

impl PythonPlugin {
    pub fn new() -> Self {
        Self { source_roots: Vec::new() }
    }

    /// Probe one module candidate: `<p>.py`, then `<p>/__init__.py`, then
    /// `<p>.pyi` — first hit wins. An empty remainder (e.g. `from .. import x`)
    /// targets the package itself, i.e. its `__init__.py`.
    fn probe_module(&self, candidate: &Path, index: &FileIndex) -> Option<PathBuf> {
        if candidate.as_os_str().is_empty() {
            return index.absolute(Path::new("__init__.py")).cloned();
        }
        let as_str = candidate.to_string_lossy();
        if let Some(abs) = index.absolute(&PathBuf::from(format!("{as_str}.py"))) {
            return Some(abs.clone());
        }
        if let Some(abs) = index.absolute(&candidate.join("__init__.py")) {
            return Some(abs.clone());
        }
        index
            .absolute(&PathBuf::from(format!("{as_str}.pyi")))
            .cloned()
    }

    /// Resolve an absolute dotted module path: workspace root first, then the
    /// configured source roots, then `src`, `lib`, `app`.
    fn resolve_absolute(&self, dotted: &str, index: &FileIndex) -> Option<PathBuf> {
        let rel: PathBuf = dotted.split('.').collect();
        if let Some(path) = self.probe_module(&rel, index) {
            return Some(path);
        }
        for root in &self.source_roots {
            if let Some(path) = self.probe_module(&root.join(&rel), index) {
                return Some(path);
            }
        }
        for root in CONVENTIONAL_ROOTS {
            if let Some(path) = self.probe_module(&Path::new(root).join(&rel), index) {
                return Some(path);
            }
        }
        None
    }

    /// Resolve a relative import: walk up `level − 1` directories from the
    /// importing file's directory (level 1 = same directory), then resolve
    /// the remaining dotted path under that base.
    fn resolve_relative(
        &self,
        level: usize,
        rest: &str,
        from: &Path,
        index: &FileIndex,
    ) -> Option<PathBuf> {
        let mut base = from.parent().unwrap_or(Path::new("")).to_path_buf();
        for _ in 1..level {
            base = match base.parent() {
                Some(p) => p.to_path_buf(),
                // Walking above the workspace root: unresolvable.
                None => return None,
            };
        }
        if rest.is_empty() {
            return index.absolute(&base.join("__init__.py")).cloned();
        }
        let rel: PathBuf = rest.split('.').collect();
        self.probe_module(&normalize(&base.join(rel)), index)
    }
}

impl Default for PythonPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for PythonPlugin {
    fn id(&self) -> &'static str {
        "python"
    }

    fn name(&self) -> &'static str {
        "Python"
    }

    fn version(&self) -> &'static str {
        "0.3.0"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn file_colors(&self) -> &'static [(&'static str, &'static str)] {
        &[("py", "#3572a5"), ("pyi", "#3572a5")]
    }

    fn default_exclude(&self) -> &'static [&'static str] {
        &[
            "**/__pycache__/**",
            "**/.venv/**",
            "**/venv/**",
            "**/*.egg-info/**",
        ]
    }

    fn initialize(&mut self, workspace_root: &Path) -> Result<(), PluginError> {
        self.source_roots = DepmapConfig::load(workspace_root)
            .source_roots
            .iter()
            .map(|r| normalize(Path::new(r)))
            .collect();
        Ok(())
    }

    fn dispose(&mut self) {
        self.source_roots.clear();
    }

    fn detect(&self, _path: &Path, content: &str) -> FileAnalysis {
        let mut references = Vec::new();

        for logical in preprocess(content) {
            if let Some(caps) = from_import_re().captures(&logical.text) {
                // One reference per from-import, to the module part.
                references.push(RawReference::new(
                    caps.get(1).map_or("", |m| m.as_str()),
                    ReferenceKind::Static,
                    logical.line,
                ));
            } else if let Some(caps) = import_re().captures(&logical.text) {
                // `import a.b, c as d` — one reference per listed module.
                for item in caps[1].split(',') {
                    let module = item.trim().split_whitespace().next().unwrap_or("");
                    // `as` aliases: the module is the first token; skip noise
                    // such as a stray trailing comma.
                    if module.is_empty() || !module.chars().next().is_some_and(is_module_start) {
                        continue;
                    }
                    references.push(RawReference::new(
                        module,
                        ReferenceKind::Static,
                        logical.line,
                    ));
                }
            }
        }

        FileAnalysis { references, declarations: Vec::new() }
    }

    fn resolve(
        &self,
        reference: &RawReference,
        from: &Path,
        index: &FileIndex,
    ) -> Option<PathBuf> {
        let specifier = reference.specifier.as_str();
        let level = specifier.chars().take_while(|&c| c == '.').count();
        if level > 0 {
            self.resolve_relative(level, &specifier[level..], from, index)
        } else {
            self.resolve_absolute(specifier, index)
        }
    }
}

fn is_module_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}
