#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod archive;
pub mod category;
pub mod download;
pub mod error;
pub mod format;
pub mod import;
pub mod manifest;
pub mod paths;
pub mod reencode;
pub mod tar;
pub mod transcode;

pub use error::ImportError;
pub use format::{Format, ListVariant};
pub use import::{ImportPlan, ImportSummary, Importer};
