use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::{Connection, FileAnalysis};

/// Current cache format version. Bump when detection or resolution semantics
/// change in a way that makes stale entries incorrect — a mismatch discards
/// the whole cache and triggers a fresh analysis, transparently.
pub const CACHE_VERSION: &str = "2";

/// Cache directory name (created in the workspace root).
pub const CACHE_DIR: &str = ".depmap";
/// Cache file name within CACHE_DIR.
pub const CACHE_FILE: &str = "cache.bin";

/// One cached file: the modification time the analysis saw, the raw detector
/// output (declarations included, so registration can be replayed on a hit
/// without re-running detection), and the resolved connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Milliseconds since epoch. Comparison key only — a file rewritten
    /// within the same millisecond is treated as unchanged (accepted
    /// staleness risk, not a correctness guarantee).
    pub mtime_ms: i64,
    /// Detector output at that mtime.
    pub analysis: FileAnalysis,
    /// Resolved connections at that mtime.
    pub connections: Vec<Connection>,
}

/// Incremental analysis cache, keyed by workspace-relative path.
///
/// No eviction policy: entries persist until `clear()` or a version bump;
/// growth is bounded in practice by the discovery file cap.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisCache {
    version: String,
    entries: BTreeMap<PathBuf, CacheEntry>,
}

impl AnalysisCache {
    /// Empty cache at the current version.
    pub fn new() -> Self {
        Self {
            version: CACHE_VERSION.to_owned(),
            entries: BTreeMap::new(),
        }
    }

    /// Cache hit iff the entry exists and its recorded mtime matches exactly.
    pub fn lookup(&self, relative: &Path, mtime_ms: i64) -> Option<&CacheEntry> {
        self.entries
            .get(relative)
            .filter(|entry| entry.mtime_ms == mtime_ms)
    }

    pub fn insert(&mut self, relative: PathBuf, entry: CacheEntry) {
        self.entries.insert(relative, entry);
    }

    /// Reset to an empty, current-version cache.
    pub fn clear(&mut self) {
        self.version = CACHE_VERSION.to_owned();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load from a store. Missing, corrupt, or version-mismatched blobs all
    /// yield a fresh cache — none of these is an error.
    pub fn load_from(store: &dyn CacheStore) -> Self {
        let Some(bytes) = store.load() else {
            return Self::new();
        };
        match bincode::serde::decode_from_slice::<Self, _>(&bytes, bincode::config::standard()) {
            Ok((cache, _)) if cache.version == CACHE_VERSION => cache,
            Ok((cache, _)) => {
                debug!(
                    found = %cache.version,
                    expected = CACHE_VERSION,
                    "cache version mismatch; starting fresh"
                );
                Self::new()
            }
            Err(err) => {
                debug!(%err, "cache blob corrupt; starting fresh");
                Self::new()
            }
        }
    }

    /// Serialize and hand the blob to the store.
    pub fn save_to(&self, store: &dyn CacheStore) -> anyhow::Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        store.save(&bytes)
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque blob persistence for the cache. The core assumes nothing about the
/// storage medium beyond get/set.
pub trait CacheStore {
    /// The stored blob, or `None` when nothing (readable) is stored.
    fn load(&self) -> Option<Vec<u8>>;
    /// Replace the stored blob.
    fn save(&self, bytes: &[u8]) -> anyhow::Result<()>;
}

/// Filesystem-backed store at `<workspace>/.depmap/cache.bin`, written
/// atomically (temp file in the same directory, then rename).
pub struct FsCacheStore {
    path: PathBuf,
}

impl FsCacheStore {
    pub fn for_workspace(workspace_root: &Path) -> Self {
        Self {
            path: workspace_root.join(CACHE_DIR).join(CACHE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the cache file if present (the `clean` command).
    pub fn remove(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl CacheStore for FsCacheStore {
    fn load(&self) -> Option<Vec<u8>> {
        std::fs::read(&self.path).ok()
    }

    fn save(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("cache path has no parent directory"))?;
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{RawReference, ReferenceKind};
    use pretty_assertions::assert_eq;

    fn sample_entry(mtime_ms: i64) -> CacheEntry {
        CacheEntry {
            mtime_ms,
            analysis: FileAnalysis {
                references: vec![RawReference::new("./b", ReferenceKind::Static, 1)],
                declarations: Vec::new(),
            },
            connections: vec![Connection {
                specifier: "./b".into(),
                resolved: Some(PathBuf::from("/ws/b.ts")),
                kind: ReferenceKind::Static,
                line: 1,
                column: None,
            }],
        }
    }

    #[test]
    fn test_lookup_requires_exact_mtime() {
        let mut cache = AnalysisCache::new();
        cache.insert(PathBuf::from("a.ts"), sample_entry(1_000));
        assert!(cache.lookup(Path::new("a.ts"), 1_000).is_some());
        assert!(cache.lookup(Path::new("a.ts"), 1_001).is_none(), "changed mtime is a miss");
        assert!(cache.lookup(Path::new("b.ts"), 1_000).is_none(), "unknown path is a miss");
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::for_workspace(dir.path());

        let mut cache = AnalysisCache::new();
        cache.insert(PathBuf::from("a.ts"), sample_entry(42));
        cache.save_to(&store).unwrap();

        let loaded = AnalysisCache::load_from(&store);
        let entry = loaded.lookup(Path::new("a.ts"), 42).expect("entry must survive reload");
        assert_eq!(entry.connections, sample_entry(42).connections);
    }

    #[test]
    fn test_version_mismatch_discards_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::for_workspace(dir.path());

        let mut stale = AnalysisCache::new();
        stale.version = "0-obsolete".to_owned();
        stale.insert(PathBuf::from("a.ts"), sample_entry(1));
        stale.save_to(&store).unwrap();

        let loaded = AnalysisCache::load_from(&store);
        assert!(loaded.is_empty(), "version mismatch must invalidate unconditionally");
    }

    #[test]
    fn test_corrupt_blob_yields_fresh_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::for_workspace(dir.path());
        store.save(b"definitely not bincode").unwrap();
        assert!(AnalysisCache::load_from(&store).is_empty());
    }

    #[test]
    fn test_missing_file_yields_fresh_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCacheStore::for_workspace(dir.path());
        assert!(AnalysisCache::load_from(&store).is_empty());
        store.remove().unwrap(); // removing a missing cache is fine
    }

    #[test]
    fn test_clear_resets_to_current_version() {
        let mut cache = AnalysisCache::new();
        cache.insert(PathBuf::from("a.ts"), sample_entry(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.version, CACHE_VERSION);
    }
}
