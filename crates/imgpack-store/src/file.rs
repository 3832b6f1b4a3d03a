use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use imgpack_core::types::Record;
use tracing::info;

use crate::format::{
    decode_file_header, decode_record_fixed, encode_file_header, encode_record_header, pad_len,
    read_u32, FILE_HEADER_LEN, RECORD_FIXED_LEN,
};
use crate::{RecordSink, RecordSource, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Write records back to back instead of aligning each to a 512-byte block.
    pub compact: bool,
}

/// Append-only store file writer.
#[derive(Debug)]
pub struct StoreWriter {
    path: PathBuf,
    out: BufWriter<File>,
    compact: bool,
    offset: u64,
    records: u64,
}

impl StoreWriter {
    /// Creates a new store. Refuses to overwrite an existing file.
    pub fn create(path: impl Into<PathBuf>, opts: WriterOptions) -> Result<Self, StoreError> {
        let path = path.into();
        let file = match std::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(path.display().to_string()));
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        let mut w = Self {
            path,
            out: BufWriter::new(file),
            compact: opts.compact,
            offset: 0,
            records: 0,
        };
        let header = encode_file_header(opts.compact);
        w.write_bytes(&header)?;
        w.pad()?;
        Ok(w)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn is_compact(&self) -> bool {
        self.compact
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        self.out.write_all(bytes)?;
        self.offset = self.offset.saturating_add(bytes.len() as u64);
        Ok(())
    }

    fn pad(&mut self) -> Result<(), StoreError> {
        if self.compact {
            return Ok(());
        }
        let pad = pad_len(self.offset);
        if pad != 0 {
            let zeros = vec![0u8; pad as usize];
            self.write_bytes(&zeros)?;
        }
        Ok(())
    }

    /// Flushes buffered bytes and syncs the file; returns the number of records written.
    pub fn finish(mut self) -> Result<u64, StoreError> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        info!(
            target: "imgpack",
            event = "store_closed",
            path = %self.path.display(),
            records = self.records,
            bytes = self.offset,
            "store closed"
        );
        Ok(self.records)
    }
}

impl RecordSink for StoreWriter {
    fn append(&mut self, record: &Record) -> Result<(), StoreError> {
        record.validate()?;
        let header = encode_record_header(record);
        self.write_bytes(&header)?;
        for field in &record.fields {
            self.write_bytes(field)?;
        }
        self.pad()?;
        self.records = self.records.saturating_add(1);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Read-only store with an ordinal index built by one scan at open time.
#[derive(Debug)]
pub struct StoreReader {
    path: PathBuf,
    input: BufReader<File>,
    compact: bool,
    offsets: Vec<u64>,
}

impl StoreReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut input = BufReader::new(file);

        let mut header = [0u8; FILE_HEADER_LEN as usize];
        read_exact_at(&mut input, 0, &mut header, file_len)?;
        let compact = decode_file_header(&header, &path.display().to_string())?;

        let mut offsets = Vec::new();
        let mut offset = align(FILE_HEADER_LEN, compact);
        let mut fixed = [0u8; RECORD_FIXED_LEN];
        while offset < file_len {
            read_exact_at(&mut input, offset, &mut fixed, file_len)?;
            let rh = decode_record_fixed(&fixed, offset)?;

            let mut lens = vec![0u8; 4 * rh.field_count];
            input.read_exact(&mut lens).map_err(|_| truncated(offset))?;
            let payload: u64 = lens.chunks_exact(4).map(|c| read_u32(c) as u64).sum();

            let end = offset
                .checked_add((RECORD_FIXED_LEN + lens.len()) as u64)
                .and_then(|v| v.checked_add(payload))
                .ok_or_else(|| truncated(offset))?;
            if end > file_len {
                return Err(truncated(offset));
            }
            offsets.push(offset);
            offset = align(end, compact);
        }

        info!(
            target: "imgpack",
            event = "store_opened",
            path = %path.display(),
            records = offsets.len() as u64,
            compact,
            "store opened"
        );
        Ok(Self {
            path,
            input,
            compact,
            offsets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_compact(&self) -> bool {
        self.compact
    }
}

impl RecordSource for StoreReader {
    fn len(&self) -> usize {
        self.offsets.len()
    }

    fn read(&mut self, ordinal: usize) -> Result<Record, StoreError> {
        let offset = *self.offsets.get(ordinal).ok_or(StoreError::OutOfRange {
            ordinal,
            len: self.offsets.len(),
        })?;

        let mut fixed = [0u8; RECORD_FIXED_LEN];
        self.input.seek(SeekFrom::Start(offset))?;
        self.input.read_exact(&mut fixed)?;
        let rh = decode_record_fixed(&fixed, offset)?;

        let mut lens = vec![0u8; 4 * rh.field_count];
        self.input.read_exact(&mut lens)?;

        let mut fields = Vec::with_capacity(rh.field_count);
        for c in lens.chunks_exact(4) {
            let mut field = vec![0u8; read_u32(c) as usize];
            self.input.read_exact(&mut field)?;
            fields.push(field);
        }
        Ok(Record {
            meta: rh.meta,
            fields,
        })
    }
}

fn align(offset: u64, compact: bool) -> u64 {
    if compact {
        offset
    } else {
        offset.saturating_add(pad_len(offset))
    }
}

fn truncated(offset: u64) -> StoreError {
    StoreError::Corrupt {
        offset,
        reason: "truncated record".to_string(),
    }
}

fn read_exact_at(
    input: &mut BufReader<File>,
    offset: u64,
    buf: &mut [u8],
    file_len: u64,
) -> Result<(), StoreError> {
    if offset.saturating_add(buf.len() as u64) > file_len {
        return Err(truncated(offset));
    }
    input.seek(SeekFrom::Start(offset))?;
    input.read_exact(buf)?;
    Ok(())
}
