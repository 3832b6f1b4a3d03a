#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use imgpack_import::download::{CachedDownloader, DEFAULT_CACHE_DIR};
use imgpack_import::format::FORMAT_HELP;
use imgpack_import::transcode::{DecodeMode, ImageTranscoder, TranscodeConfig};
use imgpack_import::{Format, ImportPlan, Importer};
use imgpack_store::{StoreWriter, WriterOptions};

#[derive(Debug, Parser)]
#[command(
    name = "imgpack-import",
    about = "Convert a dataset into an imgpack sample store.",
    override_usage = "imgpack-import [OPTIONS] <INPUT> <OUTPUT>",
    after_help = FORMAT_HELP
)]
struct Args {
    /// Input directory, manifest, or store (meaning depends on --format).
    input: Option<PathBuf>,

    /// Output store path. Must not exist yet.
    output: Option<PathBuf>,

    /// Cap on the longer image edge in pixels (-1 = no cap).
    #[arg(long = "max", env = "IMGPACK_MAX", default_value_t = -1, allow_negative_numbers = true)]
    max_size: i64,

    /// Scale images so the shorter edge equals this (-1 = keep size).
    #[arg(long, env = "IMGPACK_RESIZE", default_value_t = -1, allow_negative_numbers = true)]
    resize: i64,

    /// Decode mode: unchanged|color|gray.
    #[arg(long, env = "IMGPACK_DECODE", default_value = "unchanged")]
    decode: String,

    /// Input format selector (see Formats below).
    #[arg(short = 'f', long, env = "IMGPACK_FORMAT", default_value = "1")]
    format: String,

    /// Download cache directory for http(s) inputs.
    #[arg(long, env = "IMGPACK_CACHE", default_value = DEFAULT_CACHE_DIR)]
    cache: PathBuf,

    /// Write records back to back instead of block aligned.
    #[arg(long, env = "IMGPACK_COMPACT", default_value_t = false)]
    compact: bool,

    /// Stop after this many records (format 5 only, 0 = all).
    #[arg(long, env = "IMGPACK_LIMIT", default_value_t = 0)]
    limit: usize,

    /// Target encoding by extension, e.g. jpg or png (default: keep source format).
    #[arg(long, env = "IMGPACK_ENCODE")]
    encode: Option<String>,

    /// JPEG quality, 1-100.
    #[arg(long = "jpeg-quality", alias = "jpeg_quality", env = "IMGPACK_JPEG_QUALITY")]
    jpeg_quality: Option<u8>,
}

fn usage_and_exit(err: Option<clap::Error>) -> ! {
    match err {
        Some(e) => eprintln!("{}", e.render()),
        None => eprintln!("{}", Args::command().render_help()),
    }
    std::process::exit(1);
}

fn positive(v: i64) -> Option<u32> {
    if v > 0 {
        u32::try_from(v).ok()
    } else {
        None
    }
}

fn main() -> Result<()> {
    let args = Args::try_parse().unwrap_or_else(|e| usage_and_exit(Some(e)));
    let (Some(input), Some(output)) = (args.input.clone(), args.output.clone()) else {
        usage_and_exit(None);
    };

    imgpack_observe::logging::init_tracing();

    let format: Format = args.format.parse()?;
    let decode: DecodeMode = args.decode.parse()?;
    let transcoder = ImageTranscoder::new(TranscodeConfig {
        max_size: positive(args.max_size),
        resize: positive(args.resize),
        decode,
        encode: args.encode.clone(),
        quality: args.jpeg_quality,
    })?;

    let plan = ImportPlan::prepare(format, &input, args.limit)
        .with_context(|| format!("cannot import {} as {format}", input.display()))?;

    let mut writer = StoreWriter::create(
        &output,
        WriterOptions {
            compact: args.compact,
        },
    )?;
    let mut downloader = CachedDownloader::new(&args.cache);

    let summary = Importer::new(&transcoder, &mut downloader, &mut writer).run(plan)?;
    writer.finish()?;

    println!("{summary}");
    Ok(())
}
