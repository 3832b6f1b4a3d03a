use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::paths::PathSet;

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("cannot scan {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("need at least 2 categories to train, found {0}")]
    TooFew(usize),
    #[error("category directories must be named consecutively from 0 to N-1, found {0:?}")]
    NotContiguous(Vec<u32>),
}

/// Category ids `0..N-1`, each mapped to the files under `root/<id>`.
///
/// Ids double as dense label indices downstream; there is no remapping, so the
/// id space is checked once here and trusted everywhere else.
#[derive(Debug, Clone)]
pub struct CategorySet {
    root: PathBuf,
    categories: Vec<PathSet>,
}

/// Parses a category directory name. Only canonical decimal is accepted, so
/// `1` and `01` can never name the same category.
pub fn parse_category_name(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name.len() > 1 && name.starts_with('0') {
        return None;
    }
    name.parse().ok()
}

/// Sorted, deduplicated ids must be exactly `0..N-1` with `N >= 2`.
pub fn validate_ids(mut ids: Vec<u32>) -> Result<Vec<u32>, CategoryError> {
    ids.sort_unstable();
    ids.dedup();
    if ids.len() < 2 {
        return Err(CategoryError::TooFew(ids.len()));
    }
    let contiguous = ids.iter().enumerate().all(|(i, id)| *id as usize == i);
    if !contiguous {
        return Err(CategoryError::NotContiguous(ids));
    }
    Ok(ids)
}

impl CategorySet {
    /// Scans the immediate children of `root` as category directories.
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self, CategoryError> {
        let root = root.into();
        let io_err = |source| CategoryError::Io {
            path: root.display().to_string(),
            source,
        };

        let mut ids: Vec<u32> = Vec::new();
        for entry in std::fs::read_dir(&root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if !path.is_dir() {
                error!(
                    target: "imgpack",
                    event = "category_not_dir",
                    path = %path.display(),
                    "not a directory"
                );
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(parse_category_name) {
                Some(id) => ids.push(id),
                None => error!(
                    target: "imgpack",
                    event = "category_bad_name",
                    path = %path.display(),
                    "category directory not properly named"
                ),
            }
        }

        let ids = validate_ids(ids)?;

        let mut categories = Vec::with_capacity(ids.len());
        for id in ids {
            let dir = root.join(id.to_string());
            let set = PathSet::scan(&dir).map_err(|source| CategoryError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            info!(
                target: "imgpack",
                event = "category_loaded",
                category = id,
                files = set.len() as u64,
                "loaded {} paths for category {id}",
                set.len()
            );
            categories.push(set);
        }
        Ok(Self { root, categories })
    }

    /// One synthetic category (id 0) holding every file under `root`.
    pub fn single(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        let set = PathSet::scan(&root)?;
        Ok(Self {
            root,
            categories: vec![set],
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn total_files(&self) -> usize {
        self.categories.iter().map(PathSet::len).sum()
    }

    /// `(category id, files)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &PathSet)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(i, set)| (i as u32, set))
    }
}
