// On-disk layout, all integers little-endian:
//
//   file header: b"IMGPACK\0" | version u32 | flags u32            (16 bytes)
//   record:      b"REC1" | label f32 | label2 f32 | rflags u8 | id u64 |
//                field_count u8 | field_count x len u32 | payloads...
//
// Non-compact stores start every record on a 512-byte boundary (zero padded).

use imgpack_core::types::{Record, RecordMeta};

use crate::StoreError;

pub(crate) const FILE_MAGIC: &[u8; 8] = b"IMGPACK\0";
pub(crate) const FILE_VERSION: u32 = 1;
pub(crate) const FILE_HEADER_LEN: u64 = 16;
pub(crate) const FLAG_COMPACT: u32 = 1;

pub(crate) const RECORD_MAGIC: &[u8; 4] = b"REC1";
pub(crate) const RECORD_FIXED_LEN: usize = 4 + 4 + 4 + 1 + 8 + 1;
const RECORD_FLAG_ID: u8 = 1;

pub(crate) const BLOCK: u64 = 512;

pub(crate) fn pad_len(offset: u64) -> u64 {
    let rem = offset % BLOCK;
    if rem == 0 {
        0
    } else {
        BLOCK - rem
    }
}

pub(crate) fn encode_file_header(compact: bool) -> [u8; FILE_HEADER_LEN as usize] {
    let mut h = [0u8; FILE_HEADER_LEN as usize];
    h[0..8].copy_from_slice(FILE_MAGIC);
    h[8..12].copy_from_slice(&FILE_VERSION.to_le_bytes());
    let flags = if compact { FLAG_COMPACT } else { 0 };
    h[12..16].copy_from_slice(&flags.to_le_bytes());
    h
}

/// Returns the compact flag stored in a file header.
pub(crate) fn decode_file_header(h: &[u8], what: &str) -> Result<bool, StoreError> {
    if h.len() < FILE_HEADER_LEN as usize || &h[0..8] != FILE_MAGIC {
        return Err(StoreError::BadMagic(what.to_string()));
    }
    let version = read_u32(&h[8..12]);
    if version != FILE_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }
    Ok(read_u32(&h[12..16]) & FLAG_COMPACT != 0)
}

pub(crate) fn encode_record_header(record: &Record) -> Vec<u8> {
    let n = record.fields.len();
    let mut out = Vec::with_capacity(RECORD_FIXED_LEN + 4 * n);
    out.extend_from_slice(RECORD_MAGIC);
    out.extend_from_slice(&record.meta.label.to_le_bytes());
    out.extend_from_slice(&record.meta.label2.to_le_bytes());
    let (flags, id) = match record.meta.id {
        Some(id) => (RECORD_FLAG_ID, id),
        None => (0, 0),
    };
    out.push(flags);
    out.extend_from_slice(&id.to_le_bytes());
    // validate() caps both counts before we get here.
    out.push(n as u8);
    for field in &record.fields {
        out.extend_from_slice(&(field.len() as u32).to_le_bytes());
    }
    out
}

pub(crate) struct RecordHeader {
    pub meta: RecordMeta,
    pub field_count: usize,
}

pub(crate) fn decode_record_fixed(h: &[u8], offset: u64) -> Result<RecordHeader, StoreError> {
    if h.len() < RECORD_FIXED_LEN || &h[0..4] != RECORD_MAGIC {
        return Err(StoreError::Corrupt {
            offset,
            reason: "bad record magic".to_string(),
        });
    }
    let label = f32::from_le_bytes([h[4], h[5], h[6], h[7]]);
    let label2 = f32::from_le_bytes([h[8], h[9], h[10], h[11]]);
    let flags = h[12];
    let id = read_u64(&h[13..21]);
    let field_count = h[21] as usize;
    Ok(RecordHeader {
        meta: RecordMeta {
            label,
            label2,
            id: (flags & RECORD_FLAG_ID != 0).then_some(id),
        },
        field_count,
    })
}

pub(crate) fn read_u32(b: &[u8]) -> u32 {
    let mut a = [0u8; 4];
    a.copy_from_slice(&b[..4]);
    u32::from_le_bytes(a)
}

fn read_u64(b: &[u8]) -> u64 {
    let mut a = [0u8; 8];
    a.copy_from_slice(&b[..8]);
    u64::from_le_bytes(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_len_aligns_to_block() {
        assert_eq!(pad_len(0), 0);
        assert_eq!(pad_len(1), 511);
        assert_eq!(pad_len(512), 0);
        assert_eq!(pad_len(513), 511);
    }

    #[test]
    fn record_header_keeps_meta() {
        let rec = Record::pair(2.0, vec![1, 2, 3], vec![4]).with_id(9).with_label2(-1.5);
        let h = encode_record_header(&rec);
        assert_eq!(h.len(), RECORD_FIXED_LEN + 8);
        let decoded = decode_record_fixed(&h, 0).unwrap();
        assert_eq!(decoded.meta, rec.meta);
        assert_eq!(decoded.field_count, 2);
        assert_eq!(read_u32(&h[RECORD_FIXED_LEN..]), 3);
        assert_eq!(read_u32(&h[RECORD_FIXED_LEN + 4..]), 1);
    }

    #[test]
    fn file_header_rejects_foreign_bytes() {
        assert!(matches!(
            decode_file_header(b"PK\x03\x04 not a store", "x"),
            Err(StoreError::BadMagic(_))
        ));
        assert!(decode_file_header(&encode_file_header(true), "x").unwrap());
        assert!(!decode_file_header(&encode_file_header(false), "x").unwrap());
    }
}
