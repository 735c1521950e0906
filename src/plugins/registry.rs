use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::connection::{FileAnalysis, RawReference};
use crate::index::FileIndex;
use crate::plugins::{LanguagePlugin, PluginError};

/// Error raised when wiring plugins into the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two plugins claimed the same extension. This is a configuration error
    /// surfaced at registration time, never silently resolved by priority.
    #[error("extension `.{extension}` is already claimed by plugin `{existing}` (rejected `{rejected}`)")]
    DuplicateExtension {
        extension: String,
        existing: &'static str,
        rejected: &'static str,
    },
}

/// Owns the set of active language plugins and dispatches files to the plugin
/// claiming their extension.
///
/// Files with no matching plugin yield an empty analysis — unknown extensions
/// are legitimate orphan nodes, not failures.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn LanguagePlugin>>,
    /// extension (no dot) -> index into `plugins`.
    by_extension: HashMap<String, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with all four built-in language plugins.
    pub fn with_builtin_plugins() -> Self {
        let mut registry = Self::new();
        // Built-in extension sets are disjoint; unwrap is fine here.
        registry
            .register(Box::new(super::typescript::TypeScriptPlugin::new()))
            .unwrap();
        registry
            .register(Box::new(super::python::PythonPlugin::new()))
            .unwrap();
        registry
            .register(Box::new(super::gdscript::GdScriptPlugin::new()))
            .unwrap();
        registry
            .register(Box::new(super::csharp::CSharpPlugin::new()))
            .unwrap();
        registry
    }

    /// Register a plugin, claiming all of its supported extensions.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateExtension`] if any extension is already
    /// claimed. The plugin is not registered at all in that case.
    pub fn register(&mut self, plugin: Box<dyn LanguagePlugin>) -> Result<(), RegistryError> {
        for ext in plugin.supported_extensions() {
            if let Some(&idx) = self.by_extension.get(*ext) {
                return Err(RegistryError::DuplicateExtension {
                    extension: (*ext).to_owned(),
                    existing: self.plugins[idx].id(),
                    rejected: plugin.id(),
                });
            }
        }
        let idx = self.plugins.len();
        for ext in plugin.supported_extensions() {
            self.by_extension.insert((*ext).to_owned(), idx);
        }
        debug!(plugin = plugin.id(), version = plugin.version(), "registered plugin");
        self.plugins.push(plugin);
        Ok(())
    }

    /// The plugin claiming `path`'s extension, if any.
    pub fn plugin_for(&self, path: &Path) -> Option<&dyn LanguagePlugin> {
        let ext = path.extension()?.to_str()?;
        self.by_extension.get(ext).map(|&i| self.plugins[i].as_ref())
    }

    fn plugin_index_for(&self, path: &Path) -> Option<usize> {
        let ext = path.extension()?.to_str()?;
        self.by_extension.get(ext).copied()
    }

    /// Run detection for one file. Empty analysis for unmatched extensions.
    pub fn detect(&self, path: &Path, content: &str) -> FileAnalysis {
        match self.plugin_for(path) {
            Some(plugin) => plugin.detect(path, content),
            None => FileAnalysis::default(),
        }
    }

    /// Registration-pass fan-in: feed one file's declarations to its plugin.
    pub fn register_file(&mut self, path: &Path, analysis: &FileAnalysis) {
        if let Some(idx) = self.plugin_index_for(path) {
            self.plugins[idx].register(path, analysis);
        }
    }

    /// Resolve one raw reference for `from`. `None` for unmatched extensions.
    pub fn resolve(
        &self,
        reference: &RawReference,
        from: &Path,
        index: &FileIndex,
    ) -> Option<PathBuf> {
        self.plugin_for(from)?.resolve(reference, from, index)
    }

    /// Initialize every plugin against the workspace root.
    pub fn initialize_all(&mut self, workspace_root: &Path) -> Result<(), PluginError> {
        for plugin in &mut self.plugins {
            plugin.initialize(workspace_root)?;
        }
        Ok(())
    }

    /// Tear down per-session resolver state on every plugin.
    pub fn dispose_all(&mut self) {
        for plugin in &mut self.plugins {
            plugin.dispose();
        }
    }

    /// Default-exclude globs merged across all registered plugins, deduplicated,
    /// in registration order.
    pub fn merged_default_excludes(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for plugin in &self.plugins {
            for glob in plugin.default_exclude() {
                if seen.insert(*glob) {
                    out.push((*glob).to_owned());
                }
            }
        }
        out
    }

    /// Preferred node colors merged across all plugins: extension -> color.
    pub fn merged_file_colors(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for plugin in &self.plugins {
            for (ext, color) in plugin.file_colors() {
                out.insert((*ext).to_owned(), (*color).to_owned());
            }
        }
        out
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FileAnalysis;

    /// Minimal plugin stub claiming a configurable extension set.
    struct StubPlugin {
        id: &'static str,
        extensions: &'static [&'static str],
    }

    impl LanguagePlugin for StubPlugin {
        fn id(&self) -> &'static str {
            self.id
        }
        fn name(&self) -> &'static str {
            self.id
        }
        fn version(&self) -> &'static str {
            "0.0.0"
        }
        fn supported_extensions(&self) -> &'static [&'static str] {
            self.extensions
        }
        fn default_exclude(&self) -> &'static [&'static str] {
            &["**/stub-out/**"]
        }
        fn detect(&self, _path: &Path, _content: &str) -> FileAnalysis {
            FileAnalysis::default()
        }
        fn resolve(
            &self,
            _reference: &RawReference,
            _from: &Path,
            _index: &FileIndex,
        ) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn test_duplicate_extension_is_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Box::new(StubPlugin { id: "a", extensions: &["py"] }))
            .unwrap();
        let err = registry
            .register(Box::new(StubPlugin { id: "b", extensions: &["py"] }))
            .unwrap_err();
        match err {
            RegistryError::DuplicateExtension { extension, existing, rejected } => {
                assert_eq!(extension, "py");
                assert_eq!(existing, "a");
                assert_eq!(rejected, "b");
            }
        }
        assert_eq!(registry.plugin_count(), 1, "rejected plugin must not be registered");
    }

    #[test]
    fn test_unknown_extension_yields_empty_analysis() {
        let registry = PluginRegistry::new();
        let analysis = registry.detect(Path::new("readme.md"), "# hi");
        assert!(analysis.is_empty(), "unmatched extension must not be an error");
    }

    #[test]
    fn test_builtin_plugins_have_disjoint_extensions() {
        let registry = PluginRegistry::with_builtin_plugins();
        assert_eq!(registry.plugin_count(), 4);
        assert!(registry.plugin_for(Path::new("a.ts")).is_some());
        assert!(registry.plugin_for(Path::new("a.py")).is_some());
        assert!(registry.plugin_for(Path::new("a.gd")).is_some());
        assert!(registry.plugin_for(Path::new("a.cs")).is_some());
    }

    #[test]
    fn test_merged_default_excludes_deduplicates() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Box::new(StubPlugin { id: "a", extensions: &["xa"] }))
            .unwrap();
        registry
            .register(Box::new(StubPlugin { id: "b", extensions: &["xb"] }))
            .unwrap();
        let merged = registry.merged_default_excludes();
        assert_eq!(merged, vec!["**/stub-out/**".to_owned()]);
    }
}
