use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::config::DepmapConfig;

/// One discovered candidate file. Discovery is the only component that walks
/// the filesystem; everything downstream works from this pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub absolute: PathBuf,
    pub relative: PathBuf,
}

/// Build one matcher from config excludes plus the plugins' merged defaults.
fn build_exclude_set(config: &DepmapConfig, plugin_excludes: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in plugin_excludes.iter().chain(&config.exclude) {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => warn!(%pattern, %err, "ignoring invalid exclude glob"),
        }
    }
    builder.build().unwrap_or_else(|err| {
        warn!(%err, "failed to build exclude set; excluding nothing");
        GlobSet::empty()
    })
}

/// Walk the workspace and collect candidate files.
///
/// Respects `.gitignore` (even outside a git repository), applies the merged
/// exclude globs, and stops at `config.max_files`. Files with extensions no
/// plugin claims are still collected — they become orphan nodes, not errors.
///
/// The result is sorted by relative path so downstream passes (and the
/// registration order) are deterministic regardless of directory iteration
/// order.
pub fn walk_workspace(
    root: &Path,
    config: &DepmapConfig,
    plugin_excludes: &[String],
) -> anyhow::Result<Vec<DiscoveredFile>> {
    let excludes = build_exclude_set(config, plugin_excludes);
    let mut files = Vec::new();
    let mut capped = false;

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git
        // repository — exclusions must work for standalone workspaces.
        .require_git(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!(%err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(true) {
            continue;
        }
        let absolute = entry.path().to_path_buf();
        let relative = match absolute.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        if excludes.is_match(&relative) {
            continue;
        }
        if files.len() >= config.max_files {
            capped = true;
            break;
        }
        files.push(DiscoveredFile { absolute, relative });
    }

    if capped {
        warn!(limit = config.max_files, "discovery hit the file cap; graph is partial");
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
