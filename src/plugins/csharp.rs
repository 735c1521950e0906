use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::connection::{Declaration, FileAnalysis, RawReference, ReferenceKind};
use crate::index::FileIndex;
use crate::plugins::LanguagePlugin;

fn using_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `using N;`, `global using N;`, `using static N.T;`, `using Alias = N;`
    // The trailing `;` keeps `using (var x = ...)` statements from matching.
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:global\s+)?using\s+(static\s+)?(?:(\w+)\s*=\s*)?([\w\.]+)\s*;")
            .expect("invalid using regex")
    })
}

fn namespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Block (`namespace N {`) and file-scoped (`namespace N;`) forms.
    RE.get_or_init(|| {
        Regex::new(r"^\s*namespace\s+([\w\.]+)").expect("invalid namespace regex")
    })
}

fn type_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:class|struct|interface|enum|record)\s+(\w+)")
            .expect("invalid type declaration regex")
    })
}

// Type-usage heuristics over method bodies. Each pattern captures one
// candidate type name; capitalized identifiers only, so keywords and locals
// stay out of the set.
fn usage_patterns() -> &'static [Regex; 5] {
    static RES: OnceLock<[Regex; 5]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // new Type(
            Regex::new(r"\bnew\s+([A-Z]\w*)\s*[(<]").expect("invalid new-usage regex"),
            // Type.Member
            Regex::new(r"\b([A-Z]\w*)\s*\.\s*\w").expect("invalid member-usage regex"),
            // : Type (inheritance / base list)
            Regex::new(r":\s*([A-Z]\w*)").expect("invalid base-usage regex"),
            // <Type> generics
            Regex::new(r"<\s*([A-Z]\w*)\s*>").expect("invalid generic-usage regex"),
            // Type variable; / Type variable =
            Regex::new(r"\b([A-Z]\w*)\s+\w+\s*[;=]").expect("invalid declaration-usage regex"),
        ]
    })
}

/// Strip `//` comments (quote-aware) and track `/* ... */` block comments
/// across lines. Returns the code portion of the line, or `None` when the
/// whole line sits inside a block comment.
fn strip_comments(line: &str, in_block: &mut bool) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        if *in_block {
            if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                *in_block = false;
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        let c = bytes[i];
        match c {
            b'"' => {
                in_string = !in_string;
                out.push('"');
                i += 1;
            }
            b'\\' if in_string && i + 1 < bytes.len() => {
                out.push(bytes[i] as char);
                out.push(bytes[i + 1] as char);
                i += 2;
            }
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => break,
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                *in_block = true;
                i += 2;
            }
            _ => {
                out.push(c as char);
                i += 1;
            }
        }
    }
    if out.trim().is_empty() && *in_block {
        None
    } else {
        Some(out)
    }
}

/// C# plugin: regex `using`/`namespace` extraction plus a heuristic
/// type-usage scan, and two-pass namespace resolution.
///
/// A `using` alone does not identify a file — every file declaring the
/// namespace is a candidate, narrowed to those declaring a type the
/// referencing file actually uses. The namespace registry is populated by the
/// whole-workspace registration pass, so visitation order never matters.
pub struct CSharpPlugin {
    /// namespace -> files declaring it. BTreeSet keeps target order stable.
    namespaces: HashMap<String, BTreeSet<PathBuf>>,
    /// file -> type names it declares.
    declared_types: HashMap<PathBuf, HashSet<String>>,
    /// file -> type names its bodies reference.
    used_types: HashMap<PathBuf, HashSet<String>>,
}

impl CSharpPlugin {
    pub fn new() -> Self {
        Self {
            namespaces: HashMap::new(),
            declared_types: HashMap::new(),
            used_types: HashMap::new(),
        }
    }

    /// Files in `namespace` (other than `from`) declaring any type in `used`.
    fn narrow(
        &self,
        namespace: &str,
        used: &HashSet<String>,
        from: &Path,
        index: &FileIndex,
    ) -> Vec<PathBuf> {
        let Some(files) = self.namespaces.get(namespace) else {
            return Vec::new();
        };
        files
            .iter()
            .filter(|f| f.as_path() != from)
            .filter(|f| {
                self.declared_types
                    .get(*f)
                    .is_some_and(|declared| !declared.is_disjoint(used))
            })
            .filter_map(|f| index.absolute(f).cloned())
            .collect()
    }

    /// Files in the namespace prefix of `path` declaring its final segment as
    /// a type — handles `using static N.Type;` and type aliases.
    fn resolve_type_path(&self, path: &str, from: &Path, index: &FileIndex) -> Vec<PathBuf> {
        let Some((namespace, type_name)) = path.rsplit_once('.') else {
            return Vec::new();
        };
        let Some(files) = self.namespaces.get(namespace) else {
            return Vec::new();
        };
        files
            .iter()
            .filter(|f| f.as_path() != from)
            .filter(|f| {
                self.declared_types
                    .get(*f)
                    .is_some_and(|declared| declared.contains(type_name))
            })
            .filter_map(|f| index.absolute(f).cloned())
            .collect()
    }
}

impl Default for CSharpPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for CSharpPlugin {
    fn id(&self) -> &'static str {
        "csharp"
    }

    fn name(&self) -> &'static str {
        "C#"
    }

    fn version(&self) -> &'static str {
        "0.3.0"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }

    fn file_colors(&self) -> &'static [(&'static str, &'static str)] {
        &[("cs", "#178600")]
    }

    fn default_exclude(&self) -> &'static [&'static str] {
        &["**/bin/**", "**/obj/**", "**/*.Designer.cs"]
    }

    fn dispose(&mut self) {
        self.namespaces.clear();
        self.declared_types.clear();
        self.used_types.clear();
    }

    fn detect(&self, _path: &Path, content: &str) -> FileAnalysis {
        let mut references = Vec::new();
        let mut declarations = Vec::new();
        let mut types = Vec::new();
        let mut usage: BTreeSet<String> = BTreeSet::new();
        // Namespaces declared in this file, in order; types are attributed to
        // the most recent one (global when none was seen yet).
        let mut current_namespace: Option<usize> = None;
        let mut namespace_decls: Vec<(String, Vec<String>)> = Vec::new();
        let mut in_block = false;

        for (i, raw) in content.lines().enumerate() {
            let line_no = i as u32 + 1;
            let Some(line) = strip_comments(raw, &mut in_block) else {
                continue;
            };

            if let Some(caps) = using_re().captures(&line) {
                // Plain, `global`, `static`, and aliased forms all record the
                // target path; aliases keep the aliased namespace/type, not
                // the alias name.
                let target = caps[3].to_owned();
                references.push(RawReference::new(target, ReferenceKind::Static, line_no));
                continue;
            }

            if let Some(caps) = namespace_re().captures(&line) {
                let name = caps[1].to_owned();
                // The file's own namespace doubles as a reference: files in
                // the same namespace are reachable without a `using`.
                references.push(RawReference::new(name.clone(), ReferenceKind::Static, line_no));
                namespace_decls.push((name, Vec::new()));
                current_namespace = Some(namespace_decls.len() - 1);
            }

            for caps in type_decl_re().captures_iter(&line) {
                let name = caps[1].to_owned();
                match current_namespace {
                    Some(idx) => namespace_decls[idx].1.push(name.clone()),
                    None => types.push(name.clone()),
                }
            }

            for pattern in usage_patterns() {
                for caps in pattern.captures_iter(&line) {
                    usage.insert(caps[1].to_owned());
                }
            }
        }

        for (name, ns_types) in namespace_decls {
            declarations.push(Declaration::Namespace { name, types: ns_types });
        }
        if !types.is_empty() {
            // Global (namespace-less) types.
            declarations.push(Declaration::Namespace { name: String::new(), types });
        }
        if !usage.is_empty() {
            declarations.push(Declaration::TypeUsage(usage.into_iter().collect()));
        }

        FileAnalysis { references, declarations }
    }

    fn register(&mut self, file: &Path, analysis: &FileAnalysis) {
        for declaration in &analysis.declarations {
            match declaration {
                Declaration::Namespace { name, types } => {
                    self.namespaces
                        .entry(name.clone())
                        .or_default()
                        .insert(file.to_path_buf());
                    self.declared_types
                        .entry(file.to_path_buf())
                        .or_default()
                        .extend(types.iter().cloned());
                }
                Declaration::TypeUsage(names) => {
                    self.used_types
                        .entry(file.to_path_buf())
                        .or_default()
                        .extend(names.iter().cloned());
                }
                Declaration::ClassName(_) => {}
            }
        }
    }

    fn resolve(
        &self,
        reference: &RawReference,
        from: &Path,
        index: &FileIndex,
    ) -> Option<PathBuf> {
        self.resolve_many(reference, from, index).into_iter().next()
    }

    fn resolve_many(
        &self,
        reference: &RawReference,
        from: &Path,
        index: &FileIndex,
    ) -> Vec<PathBuf> {
        let empty = HashSet::new();
        let used = self.used_types.get(from).unwrap_or(&empty);

        let targets = self.narrow(&reference.specifier, used, from, index);
        if !targets.is_empty() {
            return targets;
        }
        // Not a known namespace (or nothing used from it): try the specifier
        // as a dotted type path (`using static N.T;`, `using A = N.T;`).
        self.resolve_type_path(&reference.specifier, from, index)
    }
}
