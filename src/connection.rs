use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The kind of cross-file reference a detector found.
///
/// Kinds carry filtering semantics for consumers of the graph; they do not
/// participate in connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceKind {
    /// A plain static import (`import X from './y'`, `import a.b`, `using N;`, `preload(...)`).
    Static,
    /// A deferred load: dynamic `import('./x')` or GDScript `load("res://x.gd")`.
    Dynamic,
    /// CommonJS `require('./x')`.
    Require,
    /// Re-export: `export { X } from './x'` / `export * from './x'`.
    ReExport,
    /// TypeScript type-only import: `import type { X } from './x'`.
    TypeOnly,
    /// Inheritance reference: GDScript `extends`, C# `: Base`.
    Inheritance,
    /// A declaration that registers a project-wide symbol (GDScript `class_name`).
    /// Declarations never resolve to another file; they feed the resolver registries.
    Declaration,
}

/// A single reference as written in source, before resolution.
///
/// Produced by a plugin's detector; pure function of file text. The
/// `specifier` is kept verbatim (including leading dots for Python relative
/// imports) so the resolver owns all path interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReference {
    /// The reference string as written (e.g. `./utils`, `mypkg.utils`, `res://x.gd`).
    pub specifier: String,
    /// Reference kind, assigned by the detector.
    pub kind: ReferenceKind,
    /// 1-based source line of the reference (post-preprocessing lines are
    /// mapped back to original source lines).
    pub line: u32,
    /// 0-based column, when the detector can report one.
    pub column: Option<u32>,
}

impl RawReference {
    pub fn new(specifier: impl Into<String>, kind: ReferenceKind, line: u32) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            line,
            column: None,
        }
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

/// A detected reference after resolution.
///
/// Immutable once produced; each file owns its own connection list and
/// connections are never merged across files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The reference as written in source.
    pub specifier: String,
    /// Absolute path of the target file, or `None` when the reference is
    /// external, unregistered, or genuinely missing. `None` is a valid
    /// steady-state outcome, not an error.
    pub resolved: Option<PathBuf>,
    /// Reference kind, carried through from detection.
    pub kind: ReferenceKind,
    /// 1-based source line.
    pub line: u32,
    /// 0-based column, when known.
    pub column: Option<u32>,
}

/// Cross-file symbol knowledge contributed by a single file.
///
/// Declarations are replayed into the resolver registries during the
/// registration pass, including for cache hits — resolution of *other* files
/// depends on them even when this file's own connections come from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    /// GDScript `class_name Name` — registers a global script class.
    ClassName(String),
    /// C# namespace declaration, with the type names declared inside it.
    Namespace { name: String, types: Vec<String> },
    /// Type identifiers this file's bodies reference (C# usage narrowing).
    TypeUsage(Vec<String>),
}

/// The full output of running a detector over one file.
///
/// This is the cached unit (together with the resolved connections): a cache
/// hit must be able to replay `declarations` without re-running detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Cross-file references found in the file.
    pub references: Vec<RawReference>,
    /// Symbols the file contributes to project-wide resolver state.
    pub declarations: Vec<Declaration>,
}

impl FileAnalysis {
    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.declarations.is_empty()
    }
}
