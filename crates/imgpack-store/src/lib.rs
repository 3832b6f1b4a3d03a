#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod file;
mod format;

pub use file::{StoreReader, StoreWriter, WriterOptions};

use imgpack_core::types::{Record, RecordError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store already exists: {0}")]
    AlreadyExists(String),
    #[error("not an imgpack store: {0}")]
    BadMagic(String),
    #[error("unsupported store version {0}")]
    UnsupportedVersion(u32),
    #[error("corrupt store at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },
    #[error("record ordinal {ordinal} out of range (store holds {len})")]
    OutOfRange { ordinal: usize, len: usize },
    #[error("invalid record: {0}")]
    Record(#[from] RecordError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only destination for imported records.
///
/// Appends are order-preserving. Any error is fatal for the run: a half-written
/// store cannot be repaired within a single pass.
pub trait RecordSink {
    fn append(&mut self, record: &Record) -> Result<(), StoreError>;

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Random-access, read-only view over an existing store.
pub trait RecordSource {
    fn len(&self) -> usize;

    fn read(&mut self, ordinal: usize) -> Result<Record, StoreError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for Vec<Record> {
    fn append(&mut self, record: &Record) -> Result<(), StoreError> {
        record.validate()?;
        self.push(record.clone());
        Ok(())
    }
}

impl RecordSource for Vec<Record> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read(&mut self, ordinal: usize) -> Result<Record, StoreError> {
        self.get(ordinal)
            .cloned()
            .ok_or(StoreError::OutOfRange {
                ordinal,
                len: self.as_slice().len(),
            })
    }
}
