use thiserror::Error;

/// Upper bound on payload fields per record (the on-disk count is a `u8`).
pub const MAX_FIELDS: usize = u8::MAX as usize;

/// Per-record metadata carried alongside the payload fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecordMeta {
    /// Scalar target: a category index stored as float, or 0 when not applicable.
    pub label: f32,
    /// Secondary label, carried through unchanged when re-encoding an existing store.
    pub label2: f32,
    /// Caller-assigned sequence number (archive import only).
    pub id: Option<u64>,
}

/// The unit appended to a store: metadata plus one or more byte payloads.
///
/// Field 0 is the primary payload (usually an encoded image). Field 1, when
/// present, is the secondary payload (annotation string or second image).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub meta: RecordMeta,
    pub fields: Vec<Vec<u8>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record must carry at least one payload field")]
    NoFields,
    #[error("record carries {0} payload fields (max {})", MAX_FIELDS)]
    TooManyFields(usize),
    #[error("payload field {index} is {len} bytes (max {})", u32::MAX)]
    FieldTooLarge { index: usize, len: usize },
}

impl Record {
    pub fn single(label: f32, primary: Vec<u8>) -> Self {
        Self {
            meta: RecordMeta {
                label,
                ..Default::default()
            },
            fields: vec![primary],
        }
    }

    pub fn pair(label: f32, primary: Vec<u8>, secondary: Vec<u8>) -> Self {
        Self {
            meta: RecordMeta {
                label,
                ..Default::default()
            },
            fields: vec![primary, secondary],
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.meta.id = Some(id);
        self
    }

    pub fn with_label2(mut self, label2: f32) -> Self {
        self.meta.label2 = label2;
        self
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn primary(&self) -> Option<&[u8]> {
        self.fields.first().map(Vec::as_slice)
    }

    pub fn secondary(&self) -> Option<&[u8]> {
        self.fields.get(1).map(Vec::as_slice)
    }

    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(Vec::len).sum()
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if self.fields.is_empty() {
            return Err(RecordError::NoFields);
        }
        if self.fields.len() > MAX_FIELDS {
            return Err(RecordError::TooManyFields(self.fields.len()));
        }
        for (index, field) in self.fields.iter().enumerate() {
            if u32::try_from(field.len()).is_err() {
                return Err(RecordError::FieldTooLarge {
                    index,
                    len: field.len(),
                });
            }
        }
        Ok(())
    }
}
