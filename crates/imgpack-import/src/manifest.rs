use std::io::BufRead;
use std::path::Path;

use imgpack_core::types::Record;
use thiserror::Error;
use tracing::error;

use crate::download::DownloadError;
use crate::format::ListVariant;
use crate::transcode::{TranscodeError, Transcoded};
use crate::{ImportError, Importer};

pub const FIELD_SEPARATOR: char = '\t';

/// A well-formed `<source>\t<value>` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestLine<'a> {
    pub source: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("expected 2 tab-separated fields, found {0}")]
    FieldCount(usize),
}

/// Why one well-formed line still produced no record.
#[derive(Debug, Error)]
pub enum RecordFailure {
    #[error("bad label {0:?}")]
    BadLabel(String),
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("not an image: {0} (empty file)")]
    Empty(String),
    #[error("not an image: {path}: {source}")]
    Transcode {
        path: String,
        #[source]
        source: TranscodeError,
    },
}

/// Splits on every tab (no delimiter compression) and requires exactly 2 fields.
pub fn parse_line(line: &str) -> Result<ManifestLine<'_>, LineError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    match fields.as_slice() {
        [source, value] => Ok(ManifestLine {
            source: *source,
            value: *value,
        }),
        other => Err(LineError::FieldCount(other.len())),
    }
}

pub fn parse_label(value: &str) -> Result<f32, RecordFailure> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RecordFailure::BadLabel(value.to_string()))
}

/// Lines of a manifest with the terminator removed. Invalid UTF-8 is replaced
/// rather than rejected so one bad byte costs at most one line.
pub struct ManifestLines<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> ManifestLines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for ManifestLines<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.inner.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl Importer<'_> {
    /// Tab-separated manifest import. Malformed lines and per-line
    /// download/decode failures are logged and skipped.
    pub fn import_list<R: BufRead>(
        &mut self,
        manifest: R,
        variant: ListVariant,
    ) -> Result<(), ImportError> {
        for (idx, line) in ManifestLines::new(manifest).enumerate() {
            let line = line.map_err(ImportError::ManifestRead)?;
            let line_no = idx as u64 + 1;

            let parsed = match parse_line(&line) {
                Ok(p) => p,
                Err(e) => {
                    error!(
                        target: "imgpack",
                        event = "bad_line",
                        line_no,
                        line = line.as_str(),
                        error = %e,
                        "bad line"
                    );
                    self.skip();
                    continue;
                }
            };

            match self.list_record(&parsed, variant) {
                Ok(record) => self.append(record)?,
                Err(e) => {
                    error!(
                        target: "imgpack",
                        event = "record_skipped",
                        line_no,
                        source = parsed.source,
                        error = %e,
                        "fail to load {}",
                        parsed.source
                    );
                    self.skip();
                }
            }
        }
        Ok(())
    }

    fn list_record(
        &mut self,
        line: &ManifestLine<'_>,
        variant: ListVariant,
    ) -> Result<Record, RecordFailure> {
        match variant {
            ListVariant::ScalarLabel => {
                let label = parse_label(line.value)?;
                let primary = self.load_image(line.source)?;
                Ok(Record::single(label, primary))
            }
            ListVariant::JsonAnnotation => {
                let primary = self.load_image(line.source)?;
                Ok(Record::pair(0.0, primary, line.value.as_bytes().to_vec()))
            }
            ListVariant::ImageAnnotation => {
                let primary = self.load_image(line.source)?;
                // An empty annotation field still yields a two-field record.
                let secondary = if line.value.is_empty() {
                    Vec::new()
                } else {
                    self.load_annotation(line.value)?
                };
                Ok(Record::pair(0.0, primary, secondary))
            }
        }
    }

    fn load_image(&mut self, locator: &str) -> Result<Vec<u8>, RecordFailure> {
        let path = self.fetcher.fetch(locator)?;
        match self.transcoder.read(&path) {
            Transcoded::Encoded(bytes) => Ok(bytes),
            Transcoded::Empty => Err(RecordFailure::Empty(display(&path))),
            Transcoded::Failed(source) => Err(RecordFailure::Transcode {
                path: display(&path),
                source,
            }),
        }
    }

    /// Like `load_image`, but an annotation that does not decode becomes an
    /// empty payload. Only a failed download drops the line.
    fn load_annotation(&mut self, locator: &str) -> Result<Vec<u8>, RecordFailure> {
        let path = self.fetcher.fetch(locator)?;
        match self.transcoder.read(&path) {
            Transcoded::Encoded(bytes) => Ok(bytes),
            Transcoded::Empty => Ok(Vec::new()),
            Transcoded::Failed(e) => {
                error!(
                    target: "imgpack",
                    event = "annotation_undecodable",
                    path = %path.display(),
                    error = %e,
                    "annotation is not an image, storing empty payload"
                );
                Ok(Vec::new())
            }
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
