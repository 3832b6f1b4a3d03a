use imgpack_core::types::Record;
use imgpack_store::RecordSource;
use tracing::{debug, error};

use crate::transcode::Transcoded;
use crate::{ImportError, Importer};

impl Importer<'_> {
    /// Re-transcodes the primary payload of every record in `source`, in
    /// ordinal order, stopping after `limit` records when `limit > 0`.
    ///
    /// Labels and the secondary payload are carried through untouched. Records
    /// that are neither one- nor two-field are not supported and are passed
    /// over without being counted.
    pub fn reencode_store(
        &mut self,
        source: &mut dyn RecordSource,
        limit: usize,
    ) -> Result<(), ImportError> {
        let total = source.len();
        let end = if limit > 0 { total.min(limit) } else { total };

        for ordinal in 0..end {
            let input = source.read(ordinal)?;
            let field_count = input.field_count();
            if !(1..=2).contains(&field_count) {
                debug!(
                    target: "imgpack",
                    event = "reencode_unsupported",
                    ordinal = ordinal as u64,
                    fields = field_count as u64,
                    "unsupported record shape"
                );
                continue;
            }

            let primary = input.primary().unwrap_or_default();
            let binary = if primary.is_empty() {
                Vec::new()
            } else {
                match self.transcoder.transcode(primary) {
                    Transcoded::Encoded(bytes) => bytes,
                    Transcoded::Empty => Vec::new(),
                    Transcoded::Failed(e) => {
                        error!(
                            target: "imgpack",
                            event = "reencode_skipped",
                            ordinal = ordinal as u64,
                            error = %e,
                            "cannot transcode record {ordinal}"
                        );
                        self.skip();
                        continue;
                    }
                }
            };

            let label = input.meta.label;
            let record = match input.secondary() {
                Some(secondary) => Record::pair(label, binary, secondary.to_vec()),
                None => Record::single(label, binary),
            }
            .with_label2(input.meta.label2);
            self.append(record)?;
        }
        Ok(())
    }
}
