use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Name of the per-project configuration file at the workspace root.
pub const CONFIG_FILE: &str = "depmap.toml";

/// Configuration loaded from `depmap.toml` at the workspace root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepmapConfig {
    /// Additional glob patterns to exclude from discovery, on top of
    /// .gitignore and the plugins' default exclusions.
    pub exclude: Vec<String>,
    /// Extra Python source roots tried when resolving absolute imports,
    /// between the workspace root and the conventional `src`/`lib`/`app`.
    pub source_roots: Vec<String>,
    /// Whether files with no resolved connections appear in the graph.
    pub show_orphans: bool,
    /// Hard cap on the number of discovered files.
    pub max_files: usize,
}

impl Default for DepmapConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            source_roots: Vec::new(),
            show_orphans: true,
            max_files: 10_000,
        }
    }
}

impl DepmapConfig {
    /// Load configuration from `depmap.toml` in the given root directory.
    ///
    /// Returns the defaults if the file does not exist or cannot be parsed;
    /// a malformed file is logged, never fatal.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %config_path.display(), %err, "failed to parse config; using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(path = %config_path.display(), %err, "failed to read config; using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = DepmapConfig::load(dir.path());
        assert!(config.exclude.is_empty());
        assert!(config.show_orphans, "orphans are shown by default");
        assert_eq!(config.max_files, 10_000);
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "exclude = [\"fixtures/**\"]\nsource_roots = [\"server/src\"]\nshow_orphans = false\nmax_files = 500\n",
        )
        .unwrap();
        let config = DepmapConfig::load(dir.path());
        assert_eq!(config.exclude, vec!["fixtures/**".to_owned()]);
        assert_eq!(config.source_roots, vec!["server/src".to_owned()]);
        assert!(!config.show_orphans);
        assert_eq!(config.max_files, 500);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "exclude = not-a-list").unwrap();
        let config = DepmapConfig::load(dir.path());
        assert!(config.exclude.is_empty());
    }
}
