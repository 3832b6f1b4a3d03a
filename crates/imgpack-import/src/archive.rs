use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use imgpack_core::types::Record;
use tracing::{error, info};

use crate::manifest::ManifestLines;
use crate::tar::TarReader;
use crate::transcode::Transcoded;
use crate::{ImportError, Importer};

/// Position within an archive-manifest run.
///
/// `global_id` counts every attempted entry across all archives, decoded or
/// not, so an id always names the same archive position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveCursor {
    pub global_id: u64,
    pub archive_index: u64,
    pub local_index: u64,
}

impl ArchiveCursor {
    pub fn begin_archive(&mut self, archive_index: u64) {
        self.archive_index = archive_index;
        self.local_index = 0;
    }

    pub fn advance(&mut self) {
        self.local_index += 1;
        self.global_id += 1;
    }
}

impl Importer<'_> {
    /// Imports every entry of every archive listed in `manifest`, one archive
    /// per line. Records are labeled with the archive's line index.
    pub fn import_archives<R: BufRead>(
        &mut self,
        manifest: R,
    ) -> Result<ArchiveCursor, ImportError> {
        let mut cursor = ArchiveCursor::default();
        for (idx, line) in ManifestLines::new(manifest).enumerate() {
            let line = line.map_err(ImportError::ManifestRead)?;
            let location = line.trim();
            cursor.begin_archive(idx as u64);

            let archive = match self.open_archive(location) {
                Ok(r) => r,
                Err(reason) => {
                    error!(
                        target: "imgpack",
                        event = "archive_open_failed",
                        archive_index = cursor.archive_index,
                        location,
                        reason = reason.as_str(),
                        "cannot open archive"
                    );
                    self.skip();
                    continue;
                }
            };
            self.import_archive(archive, &mut cursor)?;

            info!(
                target: "imgpack",
                event = "archive_done",
                archive_index = cursor.archive_index,
                entries = cursor.local_index,
                global_id = cursor.global_id,
                "{location}"
            );
        }
        Ok(cursor)
    }

    /// Streams one archive. A corrupt stream ends the archive; earlier entries stay.
    pub fn import_archive<R: Read>(
        &mut self,
        archive: R,
        cursor: &mut ArchiveCursor,
    ) -> Result<(), ImportError> {
        let label = cursor.archive_index as f32;
        for entry in TarReader::new(archive) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    error!(
                        target: "imgpack",
                        event = "archive_corrupt",
                        archive_index = cursor.archive_index,
                        local_index = cursor.local_index,
                        global_id = cursor.global_id,
                        error = %e,
                        "corrupt archive stream"
                    );
                    self.skip();
                    break;
                }
            };

            match self.transcoder.transcode(&entry.data) {
                Transcoded::Encoded(bytes) => {
                    let record = Record::single(label, bytes).with_id(cursor.global_id);
                    self.append(record)?;
                }
                other => {
                    let reason = match other {
                        Transcoded::Failed(e) => e.to_string(),
                        _ => "empty entry".to_string(),
                    };
                    error!(
                        target: "imgpack",
                        event = "archive_entry_failed",
                        archive_index = cursor.archive_index,
                        local_index = cursor.local_index,
                        global_id = cursor.global_id,
                        name = entry.header.name.as_str(),
                        reason = reason.as_str(),
                        "bad file in tar {}/{}/{}",
                        cursor.archive_index,
                        cursor.local_index,
                        cursor.global_id
                    );
                    self.skip();
                }
            }
            cursor.advance();
        }
        Ok(())
    }

    fn open_archive(&mut self, location: &str) -> Result<BufReader<File>, String> {
        let path = self.fetcher.fetch(location).map_err(|e| e.to_string())?;
        let f = File::open(&path).map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(BufReader::new(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_resets_local_index_only() {
        let mut c = ArchiveCursor::default();
        c.begin_archive(0);
        c.advance();
        c.advance();
        assert_eq!((c.archive_index, c.local_index, c.global_id), (0, 2, 2));
        c.begin_archive(1);
        c.advance();
        assert_eq!((c.archive_index, c.local_index, c.global_id), (1, 1, 3));
    }
}
