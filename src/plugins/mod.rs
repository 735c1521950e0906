pub mod csharp;
pub mod gdscript;
pub mod python;
pub mod registry;
pub mod typescript;

use std::path::{Path, PathBuf};

use crate::connection::{Connection, FileAnalysis, RawReference};
use crate::index::FileIndex;

/// Error raised by a plugin's `initialize` hook.
///
/// Initialization failures (unreadable config, malformed alias map) are
/// surfaced to the caller at setup time; detection/resolution failures are
/// never errors (a file that fails to parse simply has zero connections).
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin `{plugin}` failed to initialize: {reason}")]
    Initialize { plugin: &'static str, reason: String },
}

/// A language plugin: one import detector plus one path resolver behind a
/// uniform contract, bound to a set of file extensions.
///
/// Analysis is a two-phase protocol:
///
/// 1. **Registration** — `detect` runs over every file (pure, parallelizable),
///    then `register` is called sequentially with each file's output so
///    resolver registries (GDScript class names, C# namespaces) see every
///    declaration before any resolution happens. Visitation order must never
///    affect correctness.
/// 2. **Resolution** — `resolve` maps each raw reference to an absolute file
///    path, probing existence against the [`FileIndex`]. `None` means
///    external/unresolvable, which is an expected steady-state outcome.
///
/// Resolver state lives on the plugin instance, built fresh per analysis
/// session and cleared by `dispose` — never a module-level singleton.
pub trait LanguagePlugin: Send + Sync {
    /// Stable machine identifier, e.g. `"typescript"`.
    fn id(&self) -> &'static str;

    /// Human-readable name for diagnostics.
    fn name(&self) -> &'static str;

    /// Plugin version, independent of the crate version.
    fn version(&self) -> &'static str;

    /// File extensions (without dot) this plugin claims. Exactly one plugin
    /// may claim a given extension.
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Preferred node colors per extension, merged across plugins by the registry.
    fn file_colors(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Glob patterns discovery should exclude by default for this language
    /// (build output, package caches).
    fn default_exclude(&self) -> &'static [&'static str] {
        &[]
    }

    /// Load static resolver configuration (tsconfig aliases, source roots).
    /// Called once per analysis session before any detection.
    fn initialize(&mut self, _workspace_root: &Path) -> Result<(), PluginError> {
        Ok(())
    }

    /// Drop all accumulated resolver state. The plugin must be reusable for a
    /// fresh session after `dispose`.
    fn dispose(&mut self) {}

    /// Scan file text and emit raw references and declarations.
    /// Pure function of its inputs: no I/O, no cross-file state. `path` is
    /// only consulted for grammar selection (e.g. `.tsx` vs `.ts`).
    fn detect(&self, path: &Path, content: &str) -> FileAnalysis;

    /// Feed one file's declarations into the plugin's resolver registries.
    /// `file` is the workspace-relative path of the declaring file.
    fn register(&mut self, _file: &Path, _analysis: &FileAnalysis) {}

    /// Resolve one raw reference from `from` (workspace-relative) to an
    /// absolute file path, or `None` if unresolvable. Deterministic: same
    /// project state and inputs, same output.
    fn resolve(&self, reference: &RawReference, from: &Path, index: &FileIndex)
    -> Option<PathBuf>;

    /// Resolve a reference that may legitimately target several files (a C#
    /// `using` names a namespace, not a file). Defaults to at most one target
    /// via [`LanguagePlugin::resolve`]; order must be deterministic.
    fn resolve_many(
        &self,
        reference: &RawReference,
        from: &Path,
        index: &FileIndex,
    ) -> Vec<PathBuf> {
        self.resolve(reference, from, index).into_iter().collect()
    }
}

/// Resolve every reference in `analysis` through `plugin`, producing the
/// file's connection list. A multi-target reference yields one connection per
/// target; an unresolved reference yields a single connection with
/// `resolved: None`.
pub fn resolve_connections(
    plugin: &dyn LanguagePlugin,
    analysis: &FileAnalysis,
    from: &Path,
    index: &FileIndex,
) -> Vec<Connection> {
    let mut connections = Vec::with_capacity(analysis.references.len());
    for r in &analysis.references {
        let targets = plugin.resolve_many(r, from, index);
        if targets.is_empty() {
            connections.push(Connection {
                specifier: r.specifier.clone(),
                resolved: None,
                kind: r.kind,
                line: r.line,
                column: r.column,
            });
        } else {
            for target in targets {
                connections.push(Connection {
                    specifier: r.specifier.clone(),
                    resolved: Some(target),
                    kind: r.kind,
                    line: r.line,
                    column: r.column,
                });
            }
        }
    }
    connections
}
