#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};

use imgpack_import::transcode::{Transcode, TranscodeError, Transcoded};

pub fn temp_dir(test_name: &str) -> Result<PathBuf> {
    let mut root = std::env::temp_dir();
    root.push(format!("imgpack-import-{test_name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(&root)?;
    Ok(root)
}

/// Deterministic stand-in for the image subsystem: payloads starting with
/// `BAD` fail, empty payloads are empty, everything else is prefixed `enc:`.
#[derive(Debug, Default)]
pub struct FakeTranscoder;

impl Transcode for FakeTranscoder {
    fn transcode(&self, bytes: &[u8]) -> Transcoded {
        if bytes.is_empty() {
            return Transcoded::Empty;
        }
        if bytes.starts_with(b"BAD") {
            return Transcoded::Failed(TranscodeError::Decode("fake corrupt".to_string()));
        }
        Transcoded::Encoded([b"enc:".as_slice(), bytes].concat())
    }
}

pub fn enc(bytes: &[u8]) -> Vec<u8> {
    [b"enc:".as_slice(), bytes].concat()
}

pub fn png(w: u32, h: u32, seed: u8) -> Result<Vec<u8>> {
    let img = RgbImage::from_fn(w, h, |x, y| Rgb([x as u8 ^ seed, y as u8, seed]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

pub fn write_files(dir: &Path, count: usize, prefix: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for i in 0..count {
        std::fs::write(dir.join(format!("{prefix}{i:03}.jpg")), format!("{prefix}{i}"))?;
    }
    Ok(())
}

/// Zero-padded octal filling all but the last byte of `field`, then NUL.
fn octal(field: &mut [u8], value: u64) {
    let width = field.len() - 1;
    field[..width].copy_from_slice(format!("{value:0width$o}").as_bytes());
    field[width] = 0;
}

fn ustar_header(name: &str, size: u64) -> [u8; 512] {
    let mut block = [0u8; 512];
    block[..name.len()].copy_from_slice(name.as_bytes());
    let numeric = [
        (100..108, 0o644),
        (108..116, 0),
        (116..124, 0),
        (124..136, size),
        (136..148, 1_700_000_000),
    ];
    for (range, value) in numeric {
        octal(&mut block[range], value);
    }
    block[156] = b'0';
    block[257..265].copy_from_slice(b"ustar\x0000");
    let sum = block.iter().map(|b| u32::from(*b)).sum::<u32>() + 8 * u32::from(b' ');
    block[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
    block
}

/// A ustar archive holding `entries` as regular files.
pub fn tar_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in entries {
        out.extend_from_slice(&ustar_header(name, data.len() as u64));
        out.extend_from_slice(data);
        let rem = data.len() % 512;
        if rem != 0 {
            out.resize(out.len() + 512 - rem, 0);
        }
    }
    out.extend_from_slice(&[0u8; 1024]);
    out
}

pub fn write_tar(path: &Path, payloads: &[&[u8]]) -> Result<()> {
    let entries: Vec<(String, Vec<u8>)> = payloads
        .iter()
        .enumerate()
        .map(|(i, p)| (format!("{i:05}.jpg"), p.to_vec()))
        .collect();
    std::fs::write(path, tar_bytes(&entries))?;
    Ok(())
}
