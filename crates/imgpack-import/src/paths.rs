use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Below this many files a category is too small to train on.
pub const MIN_USABLE_FILES: usize = 10;

/// Regular files found by a recursive walk under one root, symlinks followed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSet {
    root: PathBuf,
    paths: Vec<PathBuf>,
}

impl PathSet {
    /// Walks `root`. The root itself must be a readable directory; unreadable
    /// entries below it are logged and skipped.
    pub fn scan(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        let meta = std::fs::metadata(&root)?;
        if !meta.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a directory: {}", root.display()),
            ));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!(
                        target: "imgpack",
                        event = "walk_error",
                        root = %root.display(),
                        error = %err,
                        "skipping unreadable entry"
                    );
                    continue;
                }
            };
            if entry.file_type().is_file() {
                paths.push(entry.into_path());
            }
        }

        if paths.len() < MIN_USABLE_FILES {
            warn!(
                target: "imgpack",
                event = "pathset_small",
                root = %root.display(),
                files = paths.len() as u64,
                min = MIN_USABLE_FILES as u64,
                "need at least {MIN_USABLE_FILES} files to train"
            );
        }
        Ok(Self { root, paths })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
