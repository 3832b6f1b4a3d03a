use std::io::Read;

use thiserror::Error;

const BLOCK: usize = 512;

#[derive(Debug, Error)]
pub enum TarError {
    #[error("truncated archive at offset {0}")]
    Truncated(u64),
    #[error("header checksum mismatch at offset {0}")]
    Checksum(u64),
    #[error("bad numeric field {field} at offset {offset}")]
    BadNumber { field: &'static str, offset: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    pub name: String,
    pub size: u64,
    pub mode: u32,
    pub mtime: u64,
    /// Byte offset of this entry's header block in the stream.
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    pub header: TarHeader,
    pub data: Vec<u8>,
}

/// Sequential ustar reader yielding regular-file entries in archive order.
///
/// Directories, links and pax headers are skipped; GNU long names (`L`) are
/// applied to the entry that follows. A zero block or a clean EOF on a block
/// boundary ends the stream. After an error the iterator is exhausted.
pub struct TarReader<R> {
    inner: R,
    offset: u64,
    done: bool,
    long_name: Option<String>,
}

impl<R: Read> TarReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
            long_name: None,
        }
    }

    pub fn next_entry(&mut self) -> Result<Option<TarEntry>, TarError> {
        if self.done {
            return Ok(None);
        }
        let res = self.read_entry();
        if !matches!(res, Ok(Some(_))) {
            self.done = true;
        }
        res
    }

    fn read_entry(&mut self) -> Result<Option<TarEntry>, TarError> {
        loop {
            let offset = self.offset;
            let mut h = [0u8; BLOCK];
            if !self.read_block(&mut h)? {
                return Ok(None);
            }
            if h.iter().all(|b| *b == 0) {
                return Ok(None);
            }
            verify_checksum(&h, offset)?;

            let size = parse_octal(&h[124..136]).ok_or(TarError::BadNumber {
                field: "size",
                offset,
            })?;
            let mode = parse_octal(&h[100..108]).unwrap_or(0) as u32;
            let mtime = parse_octal(&h[136..148]).unwrap_or(0);
            let typeflag = h[156];

            let data = self.read_data(size)?;

            match typeflag {
                b'0' | 0 | b'7' => {
                    let name = match self.long_name.take() {
                        Some(n) => n,
                        None => header_name(&h),
                    };
                    return Ok(Some(TarEntry {
                        header: TarHeader {
                            name,
                            size,
                            mode,
                            mtime,
                            offset,
                        },
                        data,
                    }));
                }
                b'L' => self.long_name = Some(c_str(&data)),
                _ => self.long_name = None,
            }
        }
    }

    /// Fills one block. `Ok(false)` on EOF before any byte was read.
    fn read_block(&mut self, buf: &mut [u8; BLOCK]) -> Result<bool, TarError> {
        let mut filled = 0;
        while filled < BLOCK {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TarError::Io(e)),
            }
        }
        if filled == 0 {
            return Ok(false);
        }
        if filled < BLOCK {
            return Err(TarError::Truncated(self.offset));
        }
        self.offset += BLOCK as u64;
        Ok(true)
    }

    fn read_data(&mut self, size: u64) -> Result<Vec<u8>, TarError> {
        let padded = size + pad_len(size);
        let mut data = Vec::new();
        let got = (&mut self.inner).take(padded).read_to_end(&mut data)? as u64;
        if got < padded {
            return Err(TarError::Truncated(self.offset + got));
        }
        self.offset += padded;
        data.truncate(size as usize);
        Ok(data)
    }
}

impl<R: Read> Iterator for TarReader<R> {
    type Item = Result<TarEntry, TarError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

fn pad_len(len: u64) -> u64 {
    let rem = len % BLOCK as u64;
    if rem == 0 {
        0
    } else {
        BLOCK as u64 - rem
    }
}

fn verify_checksum(h: &[u8; BLOCK], offset: u64) -> Result<(), TarError> {
    let stored = parse_octal(&h[148..156]).ok_or(TarError::BadNumber {
        field: "checksum",
        offset,
    })?;
    let actual: u64 = h
        .iter()
        .enumerate()
        .map(|(i, b)| if (148..156).contains(&i) { b' ' as u64 } else { *b as u64 })
        .sum();
    if stored != actual {
        return Err(TarError::Checksum(offset));
    }
    Ok(())
}

/// Octal digits, optionally surrounded by spaces and NUL terminated.
fn parse_octal(field: &[u8]) -> Option<u64> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    let s = std::str::from_utf8(&field[..end]).ok()?.trim();
    if s.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(s, 8).ok()
}

fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn header_name(h: &[u8; BLOCK]) -> String {
    let name = c_str(&h[0..100]);
    if &h[257..262] == b"ustar" {
        let prefix = c_str(&h[345..500]);
        if !prefix.is_empty() {
            return format!("{prefix}/{name}");
        }
    }
    name
}


#[cfg(test)]
mod tests {
    use super::testutil::{archive, push_entry};
    use super::*;

    #[test]
    fn entries_come_back_in_archive_order() {
        let bytes = archive(&[
            ("a.jpg", &b"aaa"[..]),
            ("b.jpg", &[7u8; 700][..]),
            ("c.jpg", &b""[..]),
        ]);
        let entries: Vec<TarEntry> = TarReader::new(bytes.as_slice())
            .collect::<Result<_, _>>()
            .unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.header.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(entries[0].data, b"aaa");
        assert_eq!(entries[1].data, vec![7u8; 700]);
        assert_eq!(entries[1].header.offset, 1024);
        assert!(entries[2].data.is_empty());
        assert_eq!(entries[0].header.mode, 0o644);
    }

    #[test]
    fn non_regular_entries_are_skipped_and_long_names_apply() {
        let mut bytes = Vec::new();
        push_entry(&mut bytes, "dir/", b"", b'5');
        let long = format!("{}/img.jpg", "x".repeat(120));
        let mut long_data = long.clone().into_bytes();
        long_data.push(0);
        push_entry(&mut bytes, "././@LongLink", &long_data, b'L');
        push_entry(&mut bytes, "truncated-name", b"data", b'0');
        push_entry(&mut bytes, "short.jpg", b"s", b'0');

        let entries: Vec<TarEntry> = TarReader::new(bytes.as_slice())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].header.name, long);
        assert_eq!(entries[1].header.name, "short.jpg");
    }

    #[test]
    fn eof_without_trailer_ends_cleanly() {
        let mut bytes = Vec::new();
        push_entry(&mut bytes, "a", b"1", b'0');
        assert_eq!(TarReader::new(bytes.as_slice()).count(), 1);
        assert_eq!(TarReader::new(&b""[..]).count(), 0);
    }

    #[test]
    fn truncated_data_is_an_error_then_stops() {
        let mut bytes = archive(&[("a", &[1u8; 600][..])]);
        bytes.truncate(512 + 100);
        let mut r = TarReader::new(bytes.as_slice());
        assert!(matches!(r.next(), Some(Err(TarError::Truncated(_)))));
        assert!(r.next().is_none());
    }

    #[test]
    fn corrupted_header_fails_checksum() {
        let mut bytes = archive(&[("a", &b"1"[..])]);
        bytes[0] = b'z';
        let mut r = TarReader::new(bytes.as_slice());
        assert!(matches!(r.next(), Some(Err(TarError::Checksum(0)))));
    }

    #[test]
    fn octal_fields_tolerate_padding() {
        assert_eq!(parse_octal(b"0000644\0"), Some(0o644));
        assert_eq!(parse_octal(b"  17 \0"), Some(0o17));
        assert_eq!(parse_octal(b"\0\0\0"), Some(0));
        assert_eq!(parse_octal(b"89\0"), None);
    }
}
