use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use thiserror::Error;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("read {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognized image data: {0}")]
    UnknownFormat(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("unsupported target encoding {0:?}")]
    UnsupportedEncoding(String),
    #[error("invalid decode mode {0:?} (expected: unchanged|color|gray)")]
    InvalidDecodeMode(String),
    #[error("quality must be in 1..=100, got {0}")]
    InvalidQuality(u8),
}

/// Outcome of one transcode attempt.
///
/// Empty input is its own case: an empty file is not a decode failure, and the
/// store re-encoder passes it through.
#[derive(Debug)]
pub enum Transcoded {
    Encoded(Vec<u8>),
    Empty,
    Failed(TranscodeError),
}

impl Transcoded {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            Transcoded::Empty
        } else {
            Transcoded::Encoded(bytes)
        }
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self, Transcoded::Encoded(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Keep the source channels and depth.
    #[default]
    Unchanged,
    Color,
    Gray,
}

impl FromStr for DecodeMode {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s.trim().to_ascii_lowercase().as_str() {
            "" | "unchanged" | "any" => DecodeMode::Unchanged,
            "color" | "colour" | "rgb" => DecodeMode::Color,
            "gray" | "grey" | "grayscale" => DecodeMode::Gray,
            _ => return Err(TranscodeError::InvalidDecodeMode(s.to_string())),
        };
        Ok(mode)
    }
}

/// Immutable transcoder settings, fixed for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeConfig {
    /// Cap on the longer edge; only ever shrinks.
    pub max_size: Option<u32>,
    /// Scale so the shorter edge equals this.
    pub resize: Option<u32>,
    pub decode: DecodeMode,
    /// Target encoding by extension (`jpg`, `png`, ...); `None` keeps the source format.
    pub encode: Option<String>,
    /// JPEG quality, 1..=100.
    pub quality: Option<u8>,
}

/// The image subsystem as the importer sees it.
pub trait Transcode {
    /// Re-encodes already-loaded bytes.
    fn transcode(&self, bytes: &[u8]) -> Transcoded;

    /// Loads a file and re-encodes it.
    fn read(&self, path: &Path) -> Transcoded {
        match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Transcoded::Empty,
            Ok(bytes) => self.transcode(&bytes),
            Err(source) => Transcoded::Failed(TranscodeError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageTranscoder {
    cfg: TranscodeConfig,
    target: Option<ImageFormat>,
}

impl ImageTranscoder {
    pub fn new(cfg: TranscodeConfig) -> Result<Self, TranscodeError> {
        if let Some(q) = cfg.quality {
            if !(1..=100).contains(&q) {
                return Err(TranscodeError::InvalidQuality(q));
            }
        }
        let target = match cfg.encode.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(ext) => {
                let ext = ext.trim_start_matches('.');
                let format = ImageFormat::from_extension(ext)
                    .filter(|f| f.writing_enabled())
                    .ok_or_else(|| TranscodeError::UnsupportedEncoding(ext.to_string()))?;
                Some(format)
            }
        };
        Ok(Self { cfg, target })
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.cfg
    }

    fn target_dims(&self, w: u32, h: u32) -> (u32, u32) {
        let (mut w, mut h) = (w.max(1) as f64, h.max(1) as f64);
        if let Some(r) = self.cfg.resize.filter(|r| *r > 0) {
            let scale = r as f64 / w.min(h);
            w *= scale;
            h *= scale;
        }
        if let Some(m) = self.cfg.max_size.filter(|m| *m > 0) {
            let longer = w.max(h);
            if longer > m as f64 {
                let scale = m as f64 / longer;
                w *= scale;
                h *= scale;
            }
        }
        ((w.round() as u32).max(1), (h.round() as u32).max(1))
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, TranscodeError> {
        let mut out = Cursor::new(Vec::new());
        if format == ImageFormat::Jpeg {
            // JPEG carries neither alpha nor 16-bit samples.
            let flat = match img {
                DynamicImage::ImageLuma8(_) => img.clone(),
                DynamicImage::ImageLuma16(_)
                | DynamicImage::ImageLumaA8(_)
                | DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma8(img.to_luma8()),
                DynamicImage::ImageRgb8(_) => img.clone(),
                _ => DynamicImage::ImageRgb8(img.to_rgb8()),
            };
            let quality = self.cfg.quality.unwrap_or(DEFAULT_JPEG_QUALITY);
            let encoder = JpegEncoder::new_with_quality(&mut out, quality);
            flat.write_with_encoder(encoder)
                .map_err(|e| TranscodeError::Encode(e.to_string()))?;
        } else {
            img.write_to(&mut out, format)
                .map_err(|e| TranscodeError::Encode(e.to_string()))?;
        }
        Ok(out.into_inner())
    }
}

impl Transcode for ImageTranscoder {
    fn transcode(&self, bytes: &[u8]) -> Transcoded {
        if bytes.is_empty() {
            return Transcoded::Empty;
        }
        let source = match image::guess_format(bytes) {
            Ok(f) => f,
            Err(e) => return Transcoded::Failed(TranscodeError::UnknownFormat(e.to_string())),
        };
        let img = match image::load_from_memory_with_format(bytes, source) {
            Ok(img) => img,
            Err(e) => return Transcoded::Failed(TranscodeError::Decode(e.to_string())),
        };

        let (w, h) = img.dimensions();
        let (tw, th) = self.target_dims(w, h);
        let format = self.target.unwrap_or(source);

        let untouched = self.cfg.decode == DecodeMode::Unchanged
            && (tw, th) == (w, h)
            && format == source
            && self.cfg.quality.is_none();
        if untouched {
            return Transcoded::Encoded(bytes.to_vec());
        }

        let img = match self.cfg.decode {
            DecodeMode::Unchanged => img,
            DecodeMode::Color => DynamicImage::ImageRgb8(img.to_rgb8()),
            DecodeMode::Gray => DynamicImage::ImageLuma8(img.to_luma8()),
        };
        let img = if (tw, th) == (w, h) {
            img
        } else {
            img.resize_exact(tw, th, FilterType::Triangle)
        };

        match self.encode(&img, format) {
            Ok(out) => Transcoded::from_bytes(out),
            Err(e) => Transcoded::Failed(e),
        }
    }
}
