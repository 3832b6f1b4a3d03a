use imgpack_store::StoreError;
use thiserror::Error;

use crate::category::CategoryError;
use crate::transcode::TranscodeError;

/// Fatal errors: any of these aborts the run.
///
/// Per-input failures (a bad line, an undecodable file, a corrupt archive entry)
/// never surface here; they are logged and counted as skips.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(
        "unknown format selector {0:?} (expected 0-6 or one of: dir, list, subdir, anno-json, anno-image, store, tars)"
    )]
    UnknownFormat(String),
    #[error("category scan failed: {0}")]
    Category(#[from] CategoryError),
    #[error("cannot read input {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest read failed: {0}")]
    ManifestRead(#[source] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid transcode configuration: {0}")]
    Config(#[from] TranscodeError),
}

impl ImportError {
    pub(crate) fn input(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Input {
            path: path.display().to_string(),
            source,
        }
    }
}
