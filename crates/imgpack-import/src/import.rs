use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use imgpack_core::types::Record;
use imgpack_store::{RecordSink, RecordSource, StoreReader};
use tracing::{error, info};

use crate::category::CategorySet;
use crate::download::Fetch;
use crate::format::{Format, ListVariant};
use crate::transcode::{Transcode, Transcoded};
use crate::ImportError;

/// Everything a run needs from its input, opened and validated up front.
///
/// Building the plan is where fatal input problems surface (bad category
/// layout, missing manifest, unreadable store), so the output store is never
/// created for a run that cannot proceed.
pub enum ImportPlan {
    Directories(CategorySet),
    List {
        manifest: BufReader<File>,
        variant: ListVariant,
    },
    Reencode {
        source: Box<dyn RecordSource>,
        limit: usize,
    },
    Archives {
        manifest: BufReader<File>,
    },
}

impl ImportPlan {
    pub fn prepare(format: Format, input: &Path, limit: usize) -> Result<Self, ImportError> {
        let plan = match format {
            Format::Dir => ImportPlan::Directories(
                CategorySet::single(input).map_err(|e| ImportError::input(input, e))?,
            ),
            Format::SubDir => ImportPlan::Directories(CategorySet::scan(input)?),
            Format::List => list_plan(input, ListVariant::ScalarLabel)?,
            Format::AnnoJson => list_plan(input, ListVariant::JsonAnnotation)?,
            Format::AnnoImage => list_plan(input, ListVariant::ImageAnnotation)?,
            Format::Store => ImportPlan::Reencode {
                source: Box::new(StoreReader::open(input)?),
                limit,
            },
            Format::Tars => ImportPlan::Archives {
                manifest: open_manifest(input)?,
            },
        };
        Ok(plan)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImportPlan::Directories(_) => "directories",
            ImportPlan::List { .. } => "list",
            ImportPlan::Reencode { .. } => "reencode",
            ImportPlan::Archives { .. } => "archives",
        }
    }
}

fn list_plan(input: &Path, variant: ListVariant) -> Result<ImportPlan, ImportError> {
    Ok(ImportPlan::List {
        manifest: open_manifest(input)?,
        variant,
    })
}

fn open_manifest(path: &Path) -> Result<BufReader<File>, ImportError> {
    let f = File::open(path).map_err(|e| ImportError::input(path, e))?;
    Ok(BufReader::new(f))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records appended to the output store.
    pub appended: u64,
    /// Inputs logged and skipped (files, lines, archive entries, store records).
    pub skipped: u64,
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "imported={} skipped={}", self.appended, self.skipped)
    }
}

/// Runs one ingestion strategy into a sink.
///
/// The transcoder is shared read-only across strategies; the fetcher and the
/// sink are exclusively owned for the run.
pub struct Importer<'a> {
    pub(crate) transcoder: &'a dyn Transcode,
    pub(crate) fetcher: &'a mut dyn Fetch,
    pub(crate) sink: &'a mut dyn RecordSink,
    pub(crate) summary: ImportSummary,
}

impl<'a> Importer<'a> {
    pub fn new(
        transcoder: &'a dyn Transcode,
        fetcher: &'a mut dyn Fetch,
        sink: &'a mut dyn RecordSink,
    ) -> Self {
        Self {
            transcoder,
            fetcher,
            sink,
            summary: ImportSummary::default(),
        }
    }

    pub fn summary(&self) -> ImportSummary {
        self.summary
    }

    pub fn run(mut self, plan: ImportPlan) -> Result<ImportSummary, ImportError> {
        info!(
            target: "imgpack",
            event = "import_start",
            plan = plan.kind(),
            "import starting"
        );

        match plan {
            ImportPlan::Directories(categories) => self.import_directories(&categories)?,
            ImportPlan::List { manifest, variant } => self.import_list(manifest, variant)?,
            ImportPlan::Reencode { mut source, limit } => {
                self.reencode_store(source.as_mut(), limit)?
            }
            ImportPlan::Archives { manifest } => {
                self.import_archives(manifest)?;
            }
        }
        self.sink.flush()?;

        info!(
            target: "imgpack",
            event = "import_complete",
            appended = self.summary.appended,
            skipped = self.summary.skipped,
            "loaded {} samples",
            self.summary.appended
        );
        Ok(self.summary)
    }

    /// Appends and counts. Sink errors are fatal.
    pub(crate) fn append(&mut self, record: Record) -> Result<(), ImportError> {
        self.sink.append(&record)?;
        self.summary.appended += 1;
        Ok(())
    }

    pub(crate) fn skip(&mut self) {
        self.summary.skipped += 1;
    }

    /// One record per decodable file, labeled with its category id.
    pub fn import_directories(&mut self, categories: &CategorySet) -> Result<(), ImportError> {
        for (label, paths) in categories.iter() {
            for path in paths {
                match self.transcoder.read(path) {
                    Transcoded::Encoded(bytes) => {
                        self.append(Record::single(label as f32, bytes))?;
                    }
                    other => {
                        log_not_an_image(path, &other);
                        self.skip();
                    }
                }
            }
        }
        Ok(())
    }
}

fn log_not_an_image(path: &Path, outcome: &Transcoded) {
    let reason = match outcome {
        Transcoded::Failed(e) => e.to_string(),
        _ => "empty file".to_string(),
    };
    error!(
        target: "imgpack",
        event = "record_skipped",
        path = %path.display(),
        reason = reason.as_str(),
        "not an image"
    );
}
