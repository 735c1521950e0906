use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cache::{AnalysisCache, CacheEntry, FsCacheStore};
use crate::config::DepmapConfig;
use crate::connection::{Connection, FileAnalysis};
use crate::graph::{self, GraphData};
use crate::index::FileIndex;
use crate::plugins::registry::PluginRegistry;
use crate::plugins::resolve_connections;
use crate::walker::{DiscoveredFile, walk_workspace};

/// Counters reported after a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisStats {
    /// Discovered candidate files.
    pub files: usize,
    /// Files served from the cache without re-detection.
    pub cache_hits: usize,
    /// Files freshly detected and resolved.
    pub analyzed: usize,
    /// Connections that resolved to a workspace file.
    pub resolved: usize,
    /// Connections left unresolved (external packages, misses).
    pub unresolved: usize,
}

/// The result of one whole-workspace analysis.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub graph: GraphData,
    pub stats: AnalysisStats,
}

/// Whole-workspace analysis driver.
///
/// One run is a single logical pass with an explicit ordering constraint:
/// declarations must be observed before the references that depend on them.
/// The pipeline therefore splits into a parallel pure stage (stat, read,
/// detect — rayon) and two sequential stages (registration over every file,
/// then resolution of the cache misses), which is the registration-first
/// variant of the ordering discipline.
pub struct Analyzer {
    workspace_root: PathBuf,
    config: DepmapConfig,
    registry: PluginRegistry,
}

/// Per-file working state carried between pipeline stages.
struct FileSlot {
    file: DiscoveredFile,
    mtime_ms: Option<i64>,
    /// Detector output, from cache or fresh detection.
    analysis: FileAnalysis,
    /// Resolved connections for cache hits; misses fill this in the
    /// resolution pass.
    cached_connections: Option<Vec<Connection>>,
}

impl Analyzer {
    /// Analyzer with the four built-in plugins and `depmap.toml` config.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let config = DepmapConfig::load(&workspace_root);
        Self {
            workspace_root,
            config,
            registry: PluginRegistry::with_builtin_plugins(),
        }
    }

    /// Analyzer with a caller-assembled registry (tests, embedders).
    pub fn with_registry(
        workspace_root: impl Into<PathBuf>,
        config: DepmapConfig,
        registry: PluginRegistry,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            config,
            registry,
        }
    }

    pub fn config(&self) -> &DepmapConfig {
        &self.config
    }

    /// Run the full pipeline against the on-disk cache store.
    pub fn run(&mut self, use_cache: bool, show_orphans: bool) -> anyhow::Result<AnalysisOutcome> {
        let store = FsCacheStore::for_workspace(&self.workspace_root);
        let mut cache = if use_cache {
            AnalysisCache::load_from(&store)
        } else {
            AnalysisCache::new()
        };
        let outcome = self.run_with_cache(&mut cache, show_orphans)?;
        if use_cache {
            if let Err(err) = cache.save_to(&store) {
                warn!(%err, "failed to persist analysis cache");
            }
        }
        Ok(outcome)
    }

    /// Run the full pipeline against a caller-provided cache.
    pub fn run_with_cache(
        &mut self,
        cache: &mut AnalysisCache,
        show_orphans: bool,
    ) -> anyhow::Result<AnalysisOutcome> {
        self.registry.initialize_all(&self.workspace_root)?;

        // -------------------------------------------------------------------
        // Discovery.
        // -------------------------------------------------------------------
        let plugin_excludes = self.registry.merged_default_excludes();
        let files = walk_workspace(&self.workspace_root, &self.config, &plugin_excludes)?;
        let mut stats = AnalysisStats { files: files.len(), ..AnalysisStats::default() };

        let mut index = FileIndex::new();
        for file in &files {
            index.insert(file.relative.clone(), file.absolute.clone());
        }

        // -------------------------------------------------------------------
        // Stat + cache lookup + detection. Detection is a pure function of
        // file text, so the whole stage runs on rayon; a failed read or parse
        // degrades to zero connections and is logged, never raised.
        // -------------------------------------------------------------------
        let mut slots: Vec<FileSlot> = files
            .into_par_iter()
            .map(|file| {
                let mtime_ms = file_mtime_ms(&file.absolute);
                if let Some(mtime) = mtime_ms {
                    if let Some(entry) = cache.lookup(&file.relative, mtime) {
                        return FileSlot {
                            file,
                            mtime_ms,
                            analysis: entry.analysis.clone(),
                            cached_connections: Some(entry.connections.clone()),
                        };
                    }
                }
                let analysis = match std::fs::read_to_string(&file.absolute) {
                    Ok(content) => self.registry.detect(&file.relative, &content),
                    Err(err) => {
                        // Binary or unreadable file: zero connections.
                        debug!(path = %file.relative.display(), %err, "skipping unreadable file");
                        FileAnalysis::default()
                    }
                };
                FileSlot { file, mtime_ms, analysis, cached_connections: None }
            })
            .collect();

        // -------------------------------------------------------------------
        // Registration pass: every file, cache hits included, in sorted
        // order. Registries must see all declarations before any resolution.
        // -------------------------------------------------------------------
        for slot in &slots {
            self.registry.register_file(&slot.file.relative, &slot.analysis);
        }

        // -------------------------------------------------------------------
        // Resolution pass over the misses, then cache write-back.
        // -------------------------------------------------------------------
        let mut connections: BTreeMap<PathBuf, Vec<Connection>> = BTreeMap::new();
        for slot in &mut slots {
            let conns = match slot.cached_connections.take() {
                Some(cached) => {
                    stats.cache_hits += 1;
                    cached
                }
                None => {
                    stats.analyzed += 1;
                    match self.registry.plugin_for(&slot.file.relative) {
                        Some(plugin) => {
                            resolve_connections(plugin, &slot.analysis, &slot.file.relative, &index)
                        }
                        None => Vec::new(),
                    }
                }
            };
            stats.resolved += conns.iter().filter(|c| c.resolved.is_some()).count();
            stats.unresolved += conns.iter().filter(|c| c.resolved.is_none()).count();

            if let Some(mtime_ms) = slot.mtime_ms {
                cache.insert(
                    slot.file.relative.clone(),
                    CacheEntry {
                        mtime_ms,
                        analysis: slot.analysis.clone(),
                        connections: conns.clone(),
                    },
                );
            }
            connections.insert(slot.file.relative.clone(), conns);
        }

        // -------------------------------------------------------------------
        // Graph build + per-session teardown.
        // -------------------------------------------------------------------
        let colors = self.registry.merged_file_colors();
        let graph = graph::build(&connections, &index, &colors, show_orphans);
        self.registry.dispose_all();

        info!(
            files = stats.files,
            cache_hits = stats.cache_hits,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "analysis complete"
        );
        Ok(AnalysisOutcome { graph, stats })
    }
}

/// Modification time in milliseconds since epoch, or `None` when stat fails.
fn file_mtime_ms(path: &Path) -> Option<i64> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    match modified.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => Some(d.as_millis() as i64),
        // Pre-epoch mtimes (clock skew) still get a stable key.
        Err(e) => Some(-(e.duration().as_millis() as i64)),
    }
}
