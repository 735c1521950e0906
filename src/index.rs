use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// The set of discovered workspace files, keyed by workspace-relative path.
///
/// Resolvers probe candidate paths against this index instead of the
/// filesystem: resolution stays a pure function of project state, and unit
/// tests can build an index from string literals without touching disk.
#[derive(Debug, Default, Clone)]
pub struct FileIndex {
    /// relative path -> absolute path. BTreeMap keeps iteration order stable.
    files: BTreeMap<PathBuf, PathBuf>,
    /// absolute path -> relative path, for reverse lookups during graph builds.
    by_absolute: BTreeMap<PathBuf, PathBuf>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `(relative, absolute)` path pairs.
    pub fn from_pairs<I, R, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, A)>,
        R: Into<PathBuf>,
        A: Into<PathBuf>,
    {
        let mut index = Self::new();
        for (rel, abs) in pairs {
            index.insert(rel.into(), abs.into());
        }
        index
    }

    pub fn insert(&mut self, relative: PathBuf, absolute: PathBuf) {
        let relative = normalize(&relative);
        self.by_absolute.insert(absolute.clone(), relative.clone());
        self.files.insert(relative, absolute);
    }

    /// Absolute path for a workspace-relative candidate, if the file was
    /// discovered. The candidate is normalized lexically first, so callers
    /// may pass paths containing `./` and `../` segments.
    pub fn absolute(&self, relative: &Path) -> Option<&PathBuf> {
        self.files.get(&normalize(relative))
    }

    pub fn contains(&self, relative: &Path) -> bool {
        self.absolute(relative).is_some()
    }

    /// Workspace-relative path for a known absolute path, if any.
    pub fn relative_of(&self, absolute: &Path) -> Option<&Path> {
        self.by_absolute.get(absolute).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate `(relative, absolute)` pairs in stable (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &PathBuf)> {
        self.files.iter()
    }
}

/// Lexically normalize a path: drop `.` segments, fold `..` into the parent
/// segment where one exists. Never touches the filesystem.
///
/// A `..` that would escape the root is kept (the index lookup will simply
/// miss), matching how an out-of-workspace reference should behave.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}
